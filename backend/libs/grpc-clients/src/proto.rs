/// Message definitions for the user and tweet services
///
/// Written by hand with prost derives; field tags match the services'
/// `.proto` files.

pub mod user {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetFollowersReq {
        #[prost(string, tag = "1")]
        pub user_id: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FollowStruct {
        #[prost(string, tag = "1")]
        pub id: String,
        #[prost(string, tag = "2")]
        pub follower_id: String,
        #[prost(string, tag = "3")]
        pub following_id: String,
        #[prost(int64, tag = "4")]
        pub created_at: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetFollowersRes {
        #[prost(message, repeated, tag = "1")]
        pub followers: Vec<FollowStruct>,
    }

    pub const GET_FOLLOWERS_PATH: &str = "/user.User/GetFollowers";
}

pub mod tweet {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetTweetsReq {
        #[prost(string, repeated, tag = "1")]
        pub tweet_ids: Vec<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TweetStruct {
        #[prost(string, tag = "1")]
        pub id: String,
        #[prost(string, tag = "2")]
        pub user_id: String,
        #[prost(string, tag = "3")]
        pub content: String,
        #[prost(int64, tag = "4")]
        pub num_likes: i64,
        #[prost(int64, tag = "5")]
        pub num_replys: i64,
        #[prost(int64, tag = "6")]
        pub num_reposts: i64,
        #[prost(int64, tag = "7")]
        pub created_at: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetTweetsRes {
        #[prost(message, repeated, tag = "1")]
        pub tweets: Vec<TweetStruct>,
    }

    pub const GET_TWEETS_PATH: &str = "/tweet.Tweet/GetTweets";
}
