//! Protobuf wire types for the `fleet.v1.AgentReporter` service
//!
//! With the `proto-gen` feature the code is generated from
//! `proto/fleet/v1/agent.proto` by tonic-build. Otherwise the checked-in
//! definitions below are used; they must be kept in sync with the proto file.

mod convert;

#[cfg(feature = "proto-gen")]
pub mod fleet {
    pub mod v1 {
        tonic::include_proto!("fleet.v1");
    }
}

#[cfg(not(feature = "proto-gen"))]
pub mod fleet {
    pub mod v1 {
        use prost::Message;

        #[derive(Clone, PartialEq, Message)]
        pub struct AgentData {
            #[prost(message, repeated, tag = "1")]
            pub resources: Vec<ResourceInfo>,
            #[prost(message, repeated, tag = "2")]
            pub metrics: Vec<ResourceMetric>,
            #[prost(int64, tag = "3")]
            pub timestamp: i64,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ResourceInfo {
            #[prost(string, tag = "1")]
            pub namespace: String,
            #[prost(string, repeated, tag = "2")]
            pub pods: Vec<String>,
            #[prost(string, repeated, tag = "3")]
            pub deployments: Vec<String>,
            #[prost(string, repeated, tag = "4")]
            pub services: Vec<String>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ResourceMetric {
            #[prost(string, tag = "1")]
            pub namespace: String,
            #[prost(string, tag = "2")]
            pub name: String,
            #[prost(string, tag = "3")]
            pub kind: String,
            #[prost(double, tag = "4")]
            pub cpu: f64,
            #[prost(double, tag = "5")]
            pub memory: f64,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ReportResponse {
            #[prost(bool, tag = "1")]
            pub success: bool,
            #[prost(string, tag = "2")]
            pub message: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct LogRequest {
            #[prost(string, tag = "1")]
            pub namespace: String,
            #[prost(string, tag = "2")]
            pub pod_name: String,
            #[prost(string, tag = "3")]
            pub container_name: String,
            #[prost(int32, tag = "4")]
            pub tail_lines: i32,
            #[prost(bool, tag = "5")]
            pub follow: bool,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct LogStream {
            #[prost(message, repeated, tag = "1")]
            pub logs: Vec<PodLog>,
            #[prost(bool, tag = "2")]
            pub is_complete: bool,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PodLog {
            #[prost(string, tag = "1")]
            pub namespace: String,
            #[prost(string, tag = "2")]
            pub pod_name: String,
            #[prost(string, tag = "3")]
            pub container_name: String,
            #[prost(string, tag = "4")]
            pub log_line: String,
            #[prost(int64, tag = "5")]
            pub timestamp: i64,
            #[prost(string, tag = "6")]
            pub level: String,
        }

        pub mod agent_reporter_client {
            use tonic::codegen::*;

            #[derive(Debug, Clone)]
            pub struct AgentReporterClient<T> {
                inner: tonic::client::Grpc<T>,
            }

            impl AgentReporterClient<tonic::transport::Channel> {
                /// Attempt to create a new client by connecting to a given endpoint.
                pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
                where
                    D: TryInto<tonic::transport::Endpoint>,
                    D::Error: Into<StdError>,
                {
                    let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
                    Ok(Self::new(conn))
                }
            }

            impl<T> AgentReporterClient<T>
            where
                T: tonic::client::GrpcService<tonic::body::BoxBody>,
                T::Error: Into<StdError>,
                T::ResponseBody: Body<Data = Bytes> + Send + 'static,
                <T::ResponseBody as Body>::Error: Into<StdError> + Send,
            {
                pub fn new(inner: T) -> Self {
                    let inner = tonic::client::Grpc::new(inner);
                    Self { inner }
                }

                pub async fn deliver(
                    &mut self,
                    request: impl tonic::IntoRequest<super::AgentData>,
                ) -> Result<tonic::Response<super::ReportResponse>, tonic::Status> {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path =
                        http::uri::PathAndQuery::from_static("/fleet.v1.AgentReporter/Deliver");
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn stream_pod_logs(
                    &mut self,
                    request: impl tonic::IntoRequest<super::LogRequest>,
                ) -> Result<
                    tonic::Response<tonic::codec::Streaming<super::LogStream>>,
                    tonic::Status,
                > {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/fleet.v1.AgentReporter/StreamPodLogs",
                    );
                    self.inner
                        .server_streaming(request.into_request(), path, codec)
                        .await
                }
            }
        }

        pub mod agent_reporter_server {
            use tonic::codegen::*;

            #[async_trait]
            pub trait AgentReporter: Send + Sync + 'static {
                async fn deliver(
                    &self,
                    request: tonic::Request<super::AgentData>,
                ) -> std::result::Result<tonic::Response<super::ReportResponse>, tonic::Status>;

                /// Server streaming response type for the StreamPodLogs method.
                type StreamPodLogsStream: tonic::codegen::tokio_stream::Stream<
                        Item = std::result::Result<super::LogStream, tonic::Status>,
                    > + Send
                    + 'static;

                async fn stream_pod_logs(
                    &self,
                    request: tonic::Request<super::LogRequest>,
                ) -> std::result::Result<tonic::Response<Self::StreamPodLogsStream>, tonic::Status>;
            }

            #[derive(Debug)]
            pub struct AgentReporterServer<T: AgentReporter> {
                inner: Arc<T>,
            }

            impl<T: AgentReporter> AgentReporterServer<T> {
                pub fn new(inner: T) -> Self {
                    Self::from_arc(Arc::new(inner))
                }

                pub fn from_arc(inner: Arc<T>) -> Self {
                    Self { inner }
                }
            }

            impl<T, B> tonic::codegen::Service<http::Request<B>> for AgentReporterServer<T>
            where
                T: AgentReporter,
                B: Body + Send + 'static,
                B::Error: Into<StdError> + Send + 'static,
            {
                type Response = http::Response<tonic::body::BoxBody>;
                type Error = std::convert::Infallible;
                type Future = BoxFuture<Self::Response, Self::Error>;

                fn poll_ready(
                    &mut self,
                    _cx: &mut Context<'_>,
                ) -> Poll<std::result::Result<(), Self::Error>> {
                    Poll::Ready(Ok(()))
                }

                fn call(&mut self, req: http::Request<B>) -> Self::Future {
                    let inner = Arc::clone(&self.inner);
                    match req.uri().path() {
                        "/fleet.v1.AgentReporter/Deliver" => {
                            struct DeliverSvc<T: AgentReporter>(Arc<T>);

                            impl<T: AgentReporter> tonic::server::UnaryService<super::AgentData>
                                for DeliverSvc<T>
                            {
                                type Response = super::ReportResponse;
                                type Future =
                                    BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

                                fn call(
                                    &mut self,
                                    request: tonic::Request<super::AgentData>,
                                ) -> Self::Future {
                                    let inner = Arc::clone(&self.0);
                                    let fut = async move {
                                        <T as AgentReporter>::deliver(&inner, request).await
                                    };
                                    Box::pin(fut)
                                }
                            }

                            let fut = async move {
                                let method = DeliverSvc(inner);
                                let codec = tonic::codec::ProstCodec::default();
                                let mut grpc = tonic::server::Grpc::new(codec);
                                let res = grpc.unary(method, req).await;
                                Ok(res)
                            };
                            Box::pin(fut)
                        }
                        "/fleet.v1.AgentReporter/StreamPodLogs" => {
                            struct StreamPodLogsSvc<T: AgentReporter>(Arc<T>);

                            impl<T: AgentReporter>
                                tonic::server::ServerStreamingService<super::LogRequest>
                                for StreamPodLogsSvc<T>
                            {
                                type Response = super::LogStream;
                                type ResponseStream = T::StreamPodLogsStream;
                                type Future =
                                    BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;

                                fn call(
                                    &mut self,
                                    request: tonic::Request<super::LogRequest>,
                                ) -> Self::Future {
                                    let inner = Arc::clone(&self.0);
                                    let fut = async move {
                                        <T as AgentReporter>::stream_pod_logs(&inner, request)
                                            .await
                                    };
                                    Box::pin(fut)
                                }
                            }

                            let fut = async move {
                                let method = StreamPodLogsSvc(inner);
                                let codec = tonic::codec::ProstCodec::default();
                                let mut grpc = tonic::server::Grpc::new(codec);
                                let res = grpc.server_streaming(method, req).await;
                                Ok(res)
                            };
                            Box::pin(fut)
                        }
                        _ => Box::pin(async move {
                            Ok(tonic::Status::unimplemented("unknown method").to_http())
                        }),
                    }
                }
            }

            impl<T: AgentReporter> Clone for AgentReporterServer<T> {
                fn clone(&self) -> Self {
                    Self {
                        inner: Arc::clone(&self.inner),
                    }
                }
            }

            impl<T: AgentReporter> tonic::server::NamedService for AgentReporterServer<T> {
                const NAME: &'static str = "fleet.v1.AgentReporter";
            }
        }
    }
}

pub use fleet::v1::agent_reporter_client::AgentReporterClient;
pub use fleet::v1::agent_reporter_server::{AgentReporter, AgentReporterServer};
pub use fleet::v1::*;
