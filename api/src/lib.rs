//! Wire types for the `pulsaar.PulsaarAgent` service.
//!
//! The message structs and the client/server scaffolds below are maintained
//! by hand against `proto/pulsaar.proto` so that downstream crates build
//! without a protoc toolchain. The shapes follow the tonic code generator's
//! conventions; keep them that way when extending the surface.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListRequest {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    /// Optional narrowed allow-set; the agent's effective policy applies
    /// when empty.
    #[prost(string, repeated, tag = "2")]
    pub allowed_roots: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListResponse {
    #[prost(message, repeated, tag = "1")]
    pub entries: ::prost::alloc::vec::Vec<FileInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatRequest {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub allowed_roots: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatResponse {
    #[prost(message, optional, tag = "1")]
    pub info: ::core::option::Option<FileInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequest {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub offset: i64,
    /// Zero means the maximum read size (1 MiB); larger values are rejected.
    #[prost(int64, tag = "3")]
    pub length: i64,
    #[prost(string, repeated, tag = "4")]
    pub allowed_roots: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub data: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "2")]
    pub eof: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamRequest {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    /// Zero means the default chunk size (64 KiB); capped at 1 MiB.
    #[prost(int64, tag = "2")]
    pub chunk_size: i64,
    #[prost(string, repeated, tag = "3")]
    pub allowed_roots: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthResponse {
    #[prost(bool, tag = "1")]
    pub ready: bool,
    #[prost(string, tag = "2")]
    pub version: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub status_message: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub commit: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub date: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileInfo {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub is_dir: bool,
    #[prost(int64, tag = "3")]
    pub size_bytes: i64,
    #[prost(string, tag = "4")]
    pub mode: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "5")]
    pub mtime: ::core::option::Option<::prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Empty {}

/// Client for the `pulsaar.PulsaarAgent` service.
pub mod pulsaar_agent_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::http::Uri;
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct PulsaarAgentClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl PulsaarAgentClient<tonic::transport::Channel> {
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

    impl<T> PulsaarAgentClient<T>
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

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        pub async fn list(
            &mut self,
            request: impl tonic::IntoRequest<super::ListRequest>,
        ) -> std::result::Result<tonic::Response<super::ListResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pulsaar.PulsaarAgent/List");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pulsaar.PulsaarAgent", "List"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn stat(
            &mut self,
            request: impl tonic::IntoRequest<super::StatRequest>,
        ) -> std::result::Result<tonic::Response<super::StatResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pulsaar.PulsaarAgent/Stat");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pulsaar.PulsaarAgent", "Stat"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn read(
            &mut self,
            request: impl tonic::IntoRequest<super::ReadRequest>,
        ) -> std::result::Result<tonic::Response<super::ReadResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pulsaar.PulsaarAgent/Read");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pulsaar.PulsaarAgent", "Read"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn stream(
            &mut self,
            request: impl tonic::IntoRequest<super::StreamRequest>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<super::ReadResponse>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pulsaar.PulsaarAgent/Stream");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pulsaar.PulsaarAgent", "Stream"));
            self.inner.server_streaming(req, path, codec).await
        }

        pub async fn health(
            &mut self,
            request: impl tonic::IntoRequest<super::Empty>,
        ) -> std::result::Result<tonic::Response<super::HealthResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pulsaar.PulsaarAgent/Health");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pulsaar.PulsaarAgent", "Health"));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// Server scaffold for the `pulsaar.PulsaarAgent` service.
pub mod pulsaar_agent_server {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;

    /// The capability set served by an agent implementation.
    #[async_trait]
    pub trait PulsaarAgent: Send + Sync + 'static {
        async fn list(
            &self,
            request: tonic::Request<super::ListRequest>,
        ) -> std::result::Result<tonic::Response<super::ListResponse>, tonic::Status>;

        async fn stat(
            &self,
            request: tonic::Request<super::StatRequest>,
        ) -> std::result::Result<tonic::Response<super::StatResponse>, tonic::Status>;

        async fn read(
            &self,
            request: tonic::Request<super::ReadRequest>,
        ) -> std::result::Result<tonic::Response<super::ReadResponse>, tonic::Status>;

        /// Server streaming response type for the Stream method.
        type StreamStream: tokio_stream::Stream<
                Item = std::result::Result<super::ReadResponse, tonic::Status>,
            > + Send
            + 'static;

        async fn stream(
            &self,
            request: tonic::Request<super::StreamRequest>,
        ) -> std::result::Result<tonic::Response<Self::StreamStream>, tonic::Status>;

        async fn health(
            &self,
            request: tonic::Request<super::Empty>,
        ) -> std::result::Result<tonic::Response<super::HealthResponse>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct PulsaarAgentServer<T: PulsaarAgent> {
        inner: Arc<T>,
    }

    impl<T: PulsaarAgent> PulsaarAgentServer<T> {
        pub fn new(inner: T) -> Self {
            Self::from_arc(Arc::new(inner))
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T, B> Service<http::Request<B>> for PulsaarAgentServer<T>
    where
        T: PulsaarAgent,
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
            match req.uri().path() {
                "/pulsaar.PulsaarAgent/List" => {
                    #[allow(non_camel_case_types)]
                    struct ListSvc<T: PulsaarAgent>(pub Arc<T>);
                    impl<T: PulsaarAgent> tonic::server::UnaryService<super::ListRequest> for ListSvc<T> {
                        type Response = super::ListResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ListRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut =
                                async move { <T as PulsaarAgent>::list(&inner, request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = Arc::clone(&self.inner);
                    let fut = async move {
                        let method = ListSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pulsaar.PulsaarAgent/Stat" => {
                    #[allow(non_camel_case_types)]
                    struct StatSvc<T: PulsaarAgent>(pub Arc<T>);
                    impl<T: PulsaarAgent> tonic::server::UnaryService<super::StatRequest> for StatSvc<T> {
                        type Response = super::StatResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::StatRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut =
                                async move { <T as PulsaarAgent>::stat(&inner, request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = Arc::clone(&self.inner);
                    let fut = async move {
                        let method = StatSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pulsaar.PulsaarAgent/Read" => {
                    #[allow(non_camel_case_types)]
                    struct ReadSvc<T: PulsaarAgent>(pub Arc<T>);
                    impl<T: PulsaarAgent> tonic::server::UnaryService<super::ReadRequest> for ReadSvc<T> {
                        type Response = super::ReadResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ReadRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut =
                                async move { <T as PulsaarAgent>::read(&inner, request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = Arc::clone(&self.inner);
                    let fut = async move {
                        let method = ReadSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pulsaar.PulsaarAgent/Stream" => {
                    #[allow(non_camel_case_types)]
                    struct StreamSvc<T: PulsaarAgent>(pub Arc<T>);
                    impl<T: PulsaarAgent>
                        tonic::server::ServerStreamingService<super::StreamRequest>
                        for StreamSvc<T>
                    {
                        type Response = super::ReadResponse;
                        type ResponseStream = T::StreamStream;
                        type Future =
                            BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::StreamRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut =
                                async move { <T as PulsaarAgent>::stream(&inner, request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = Arc::clone(&self.inner);
                    let fut = async move {
                        let method = StreamSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec);
                        let res = grpc.server_streaming(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pulsaar.PulsaarAgent/Health" => {
                    #[allow(non_camel_case_types)]
                    struct HealthSvc<T: PulsaarAgent>(pub Arc<T>);
                    impl<T: PulsaarAgent> tonic::server::UnaryService<super::Empty> for HealthSvc<T> {
                        type Response = super::HealthResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::Empty>) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut =
                                async move { <T as PulsaarAgent>::health(&inner, request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = Arc::clone(&self.inner);
                    let fut = async move {
                        let method = HealthSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(empty_body())
                        .unwrap())
                }),
            }
        }
    }

    impl<T: PulsaarAgent> Clone for PulsaarAgentServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<T: PulsaarAgent> tonic::server::NamedService for PulsaarAgentServer<T> {
        const NAME: &'static str = "pulsaar.PulsaarAgent";
    }
}
