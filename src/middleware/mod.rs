//! Request/response middleware installed by [`Configurator::into_router`](crate::Configurator::into_router).

pub mod cors;
pub mod tunneling;
