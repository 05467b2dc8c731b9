//! Background tasks driving a [`WsClient`](crate::ws_client::WsClient).

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
