#[macro_export]
macro_rules! service {
    () => {
        compile_error!("empty service is not allowed");
    };
    (
        $(#[$service_attr:meta])*
        service $svc_name:ident {
            $(
                $(#[$method_attr:meta])*
                fn $method_name:ident($($arg_id:ident: $arg_ty:ty),*) -> $output:ty;
            )*
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$service_attr])*
        pub mod $svc_name {
            use super::*;

            use std::time::Duration;

            use $crate::network::Packet;
            use $crate::{client, server};

            use $crate::tokio::sync::mpsc::{self, Receiver, Sender};
            use $crate::serde_json;
            use $crate::serde::{Deserialize, Serialize};
            use $crate::anyhow::{anyhow, Result};
            use $crate::async_trait;
            use $crate::log::trace;

            #[derive(Debug, Deserialize, Serialize)]
            pub enum Request {
                $(
                    #[allow(non_camel_case_types)]
                    $method_name { $($arg_id: $arg_ty),* }
                ),*
            }

            mod response {
                use super::*;
                $(
                    #[derive(Deserialize, Serialize)]
                    #[allow(non_camel_case_types)]
                    pub struct $method_name {
                        pub data: $output
                    }
                )*
            }

            #[async_trait]
            pub trait Service: Send + 'static {
                $(
                    $(#[$method_attr])*
                    async fn $method_name(&mut self, $($arg_id: $arg_ty),*) -> Result<$output>;
                )*

                /// Periodic maintenance hook, driven by the server loop when
                /// a tick interval is configured.
                async fn tick(&mut self) -> Result<()> {
                    Ok(())
                }
            }

            #[derive(Debug, Clone)]
            pub struct Client {
                me: String,
                server_id: String,
                tx: Sender<Packet>,
                timeout: Duration,
            }

            impl Client {
                /// Replace the per-attempt timeout.
                pub fn with_timeout(mut self, timeout: Duration) -> Self {
                    self.timeout = timeout;
                    self
                }

                $(
                    pub async fn $method_name(&self, $($arg_id: $arg_ty),*) -> Result<$output> {
                        let req = Request::$method_name {
                            $($arg_id),*
                        };
                        let resp = self.call(serde_json::to_string(&req)?).await?;
                        let resp: response::$method_name = serde_json::from_str(&resp)?;
                        Ok(resp.data)
                    }
                )*

                pub async fn call(&self, req: String) -> Result<String> {
                    let (tx, mut rx) = mpsc::channel(1);
                    self.tx
                        .send(Packet {
                            from: self.me.clone(),
                            to: self.server_id.clone(),
                            reply: tx,
                            data: req.clone(),
                        })
                        .await?;
                    match $crate::tokio::time::timeout(self.timeout, rx.recv()).await {
                        Ok(Some(resp)) => {
                            trace!("req: {}, resp: {}", req, &resp);
                            Ok(resp)
                        }
                        Ok(None) => Err(anyhow!("connection to {} reset", self.server_id)),
                        Err(_) => Err(anyhow!("request to {} timed out", self.server_id)),
                    }
                }
            }

            impl client::Client for Client {
                fn new(me: String, server_id: String, net_tx: Sender<Packet>) -> Self {
                    Self {
                        me,
                        server_id,
                        tx: net_tx,
                        timeout: $crate::RPC_TIMEOUT,
                    }
                }
            }

            #[derive(Debug)]
            pub struct Server<T: Service + Send> {
                svc: T,
                tx: Sender<Packet>,
                rx: Receiver<Packet>,
                tick_interval: Option<Duration>,
            }

            #[async_trait]
            impl<T: Service + Send> server::Server for Server<T> {
                type Service = T;

                fn from_service(svc: Self::Service) -> Self {
                    let (tx, rx) = mpsc::channel(100);
                    Self {
                        svc,
                        tx,
                        rx,
                        tick_interval: None,
                    }
                }

                fn client_chan(&self) -> Sender<Packet> {
                    self.tx.clone()
                }

                fn set_tick_interval(&mut self, interval: Duration) {
                    self.tick_interval = Some(interval);
                }

                fn tick_interval(&self) -> Option<Duration> {
                    self.tick_interval
                }

                async fn recv(&mut self) -> Option<Packet> {
                    self.rx.recv().await
                }

                async fn process(&mut self, pkt: Packet) -> Result<()> {
                    let Packet { reply, data, .. } = pkt;
                    trace!("handle recv: {}", &data);
                    let req: Request = serde_json::from_str(&data)?;
                    match req {
                        $(
                            Request::$method_name { $($arg_id),* } => {
                                let data = self.svc.$method_name($($arg_id),*).await?;
                                let resp = serde_json::to_string(&response::$method_name { data })?;
                                trace!("handle send: {}", &resp);
                                reply.send(resp).await?;
                            }
                        )*
                    }
                    Ok(())
                }

                async fn tick(&mut self) -> Result<()> {
                    self.svc.tick().await
                }
            }
        }
    };
}
