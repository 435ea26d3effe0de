//! 类型化回调到调度描述符的桥接。
//!
//! # 设计背景（Why）
//! - 调用方以普通异步闭包注册回调，例如 `|ctx: CallContext, event: Event| async move { ... }`；
//! - 每个参数类型通过 [`ReceiverParam`] 声明自己的槽位并负责从单次调用中提取实参，
//!   返回类型通过 [`ReceiverOutput`] 声明是否携带错误；
//! - 宏为 0–5 个参数生成 [`ReceiverHandler`] 实现：五参数形态仍能通过类型检查，
//!   随后在注册时报告 `TooManyParameters`，而不是变成难以理解的 trait 约束错误。
//!
//! # 契约说明（What）
//! - [`ReceiverFn::new`] 完成一次性形态校验；[`ReceiverFn::invoke`] 只做参数装配与调用；
//! - 类型化数据提取失败返回 [`InvokeError::Data`]，只影响当前消息；回调返回的错误为 [`InvokeError::Callback`]。

use std::future::Future;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use spark_event::{CallContext, Event, EventError};

use crate::error::{BoxError, SignatureError};
use crate::signature::{Descriptor, ParamType, ReturnType, Signature};

/// 单次调用可用的全部实参来源。
pub struct Invocation<'a> {
    pub ctx: &'a CallContext,
    pub event: &'a Event,
    pub response: &'a ResponseSlot,
}

/// 可作为回调参数的类型。
pub trait ReceiverParam: Sized + Send + 'static {
    fn param_type() -> ParamType;

    fn extract(invocation: &Invocation<'_>) -> Result<Self, EventError>;
}

impl ReceiverParam for CallContext {
    fn param_type() -> ParamType {
        ParamType::Context
    }

    fn extract(invocation: &Invocation<'_>) -> Result<Self, EventError> {
        Ok(invocation.ctx.clone())
    }
}

impl ReceiverParam for Event {
    fn param_type() -> ParamType {
        ParamType::Event
    }

    fn extract(invocation: &Invocation<'_>) -> Result<Self, EventError> {
        Ok(invocation.event.clone())
    }
}

/// 类型化数据参数：每次调用都新建 `T` 并通过事件的数据解码契约填充。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data<T>(pub T);

impl<T> Data<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Data<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> ReceiverParam for Data<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn param_type() -> ParamType {
        ParamType::Data(std::any::type_name::<T>())
    }

    fn extract(invocation: &Invocation<'_>) -> Result<Self, EventError> {
        invocation.event.data_as::<T>().map(Data)
    }
}

/// 响应槽：回调写入的事件会作为响应交给传输层的回应通道。
///
/// 槽位是共享句柄，克隆体之间看到同一份状态。
#[derive(Clone, Debug, Default)]
pub struct ResponseSlot {
    inner: Arc<Mutex<Option<Event>>>,
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, event: Event) {
        *self.inner.lock() = Some(event);
    }

    pub fn is_set(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn get(&self) -> Option<Event> {
        self.inner.lock().clone()
    }

    pub fn take(&self) -> Option<Event> {
        self.inner.lock().take()
    }
}

impl ReceiverParam for ResponseSlot {
    fn param_type() -> ParamType {
        ParamType::Response
    }

    fn extract(invocation: &Invocation<'_>) -> Result<Self, EventError> {
        Ok(invocation.response.clone())
    }
}

/// 可作为回调返回值的类型。
pub trait ReceiverOutput: Send + 'static {
    fn return_types() -> Vec<ReturnType>;

    fn into_result(self) -> Result<(), BoxError>;
}

impl ReceiverOutput for () {
    fn return_types() -> Vec<ReturnType> {
        Vec::new()
    }

    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> ReceiverOutput for Result<(), E>
where
    E: Into<BoxError> + Send + 'static,
{
    fn return_types() -> Vec<ReturnType> {
        vec![ReturnType::Error]
    }

    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// 单次调用失败的原因。
#[derive(Debug)]
pub enum InvokeError {
    /// 类型化数据无法从事件负载解码。
    Data(EventError),
    /// 回调自身返回的错误。
    Callback(BoxError),
}

/// 可注册为接收回调的函数；`Args` 为参数元组，仅用于区分实现。
pub trait ReceiverHandler<Args>: Send + Sync + 'static {
    fn signature() -> Signature;

    fn call(
        &self,
        invocation: &Invocation<'_>,
    ) -> Result<BoxFuture<'static, Result<(), BoxError>>, EventError>;
}

macro_rules! impl_receiver_handler {
    ($($param:ident),*) => {
        impl<F, Fut, Out, $($param,)*> ReceiverHandler<($($param,)*)> for F
        where
            F: Fn($($param),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Out> + Send + 'static,
            Out: ReceiverOutput,
            $($param: ReceiverParam,)*
        {
            fn signature() -> Signature {
                Signature::from_parts(
                    vec![$(<$param as ReceiverParam>::param_type()),*],
                    Out::return_types(),
                )
            }

            #[allow(non_snake_case, unused_variables)]
            fn call(
                &self,
                invocation: &Invocation<'_>,
            ) -> Result<BoxFuture<'static, Result<(), BoxError>>, EventError> {
                $(let $param = <$param as ReceiverParam>::extract(invocation)?;)*
                let future = (self)($($param),*);
                Ok(Box::pin(async move { future.await.into_result() }))
            }
        }
    };
}

impl_receiver_handler!();
impl_receiver_handler!(A);
impl_receiver_handler!(A, B);
impl_receiver_handler!(A, B, C);
impl_receiver_handler!(A, B, C, D);
impl_receiver_handler!(A, B, C, D, E);

trait ErasedHandler: Send + Sync {
    fn call(
        &self,
        invocation: &Invocation<'_>,
    ) -> Result<BoxFuture<'static, Result<(), BoxError>>, EventError>;
}

struct Erased<H, Args> {
    handler: H,
    _args: PhantomData<fn() -> Args>,
}

impl<H, Args> ErasedHandler for Erased<H, Args>
where
    H: ReceiverHandler<Args>,
    Args: 'static,
{
    fn call(
        &self,
        invocation: &Invocation<'_>,
    ) -> Result<BoxFuture<'static, Result<(), BoxError>>, EventError> {
        self.handler.call(invocation)
    }
}

/// 通过形态校验的回调。
#[derive(Clone)]
pub struct ReceiverFn {
    signature: Signature,
    descriptor: Descriptor,
    handler: Arc<dyn ErasedHandler>,
}

impl ReceiverFn {
    /// 校验回调形态；失败时报告具体位置与原因。
    pub fn new<H, Args>(handler: H) -> Result<Self, SignatureError>
    where
        H: ReceiverHandler<Args>,
        Args: 'static,
    {
        let signature = H::signature();
        let descriptor = signature.validate()?;
        Ok(Self {
            signature,
            descriptor,
            handler: Arc::new(Erased {
                handler,
                _args: PhantomData,
            }),
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// 按描述符装配参数并调用回调。
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        event: &Event,
        response: &ResponseSlot,
    ) -> Result<(), InvokeError> {
        let invocation = Invocation {
            ctx,
            event,
            response,
        };
        let future = self.handler.call(&invocation).map_err(InvokeError::Data)?;
        future.await.map_err(InvokeError::Callback)
    }
}

impl std::fmt::Debug for ReceiverFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverFn")
            .field("signature", &self.signature)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
