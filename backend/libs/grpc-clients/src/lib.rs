/// gRPC Clients Library
///
/// Collaborators the feed pipeline talks to over gRPC:
/// - `user.User/GetFollowers`: who should receive a new post (fan-out)
/// - `tweet.Tweet/GetTweets`: post bodies for a page of timeline ids (read)
///
/// Each collaborator is a trait with a tonic-backed implementation and an
/// in-memory double, so the worker and the read service can be exercised
/// without a network.
pub mod config;
pub mod followers;
pub mod hydration;
pub mod proto;

pub use config::{GrpcConfig, GrpcConfigError};
pub use followers::{FollowerResolver, GrpcFollowerResolver, MemoryFollowerResolver, ResolveError};
pub use hydration::{
    GrpcPostHydrator, HydratedPost, HydrationError, MemoryPostHydrator, PostHydrator,
};

use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

/// Issue a unary call on `channel`, the way generated clients do
pub(crate) async fn unary<Req, Res>(
    channel: Channel,
    path: &'static str,
    request: Req,
) -> Result<Res, tonic::Status>
where
    Req: prost::Message + Send + Sync + 'static,
    Res: prost::Message + Default + Send + Sync + 'static,
{
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| tonic::Status::unavailable(format!("service was not ready: {}", e)))?;

    let codec: ProstCodec<Req, Res> = ProstCodec::default();
    let response = grpc
        .unary(
            tonic::Request::new(request),
            PathAndQuery::from_static(path),
            codec,
        )
        .await?;

    Ok(response.into_inner())
}
