//! Feed endpoint url

use std::{fmt::Display, str::FromStr};

use snafu::prelude::*;
use url::Url;

use super::message::SubscriptionKey;

/// Parse string as endpoint url error
#[derive(Debug, Snafu)]
#[snafu(
    visibility(pub(crate)),
    module(parse_endpoint_error_variant),
    context(suffix(false))
)]
pub enum ParseEndpointError {
    #[snafu(display("{s} is an invalid url: {source}"))]
    /// the str is not a valid url
    InvalidURL {
        /// string be parsed
        s: String,
        /// source error
        source: url::ParseError,
    },

    /// the parsed url schema is not websocket
    #[snafu(display("the url {s} has invalid schema {schema}, only ws or wss is ok"))]
    InvalidSchema {
        /// the url
        s: String,
        /// invalid schema
        schema: String,
    },

    /// the parsed url has no host
    #[snafu(display("the endpoint url {s} has no host"))]
    NoHost {
        /// the url
        s: String,
    },
}

/// Base websocket url of the feed, every subscription gets its own path below it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// construct the url of one subscription: `<base>/<entity id>?type=<entity type>[&token=..]`
    pub fn url(&self, key: &SubscriptionKey, token: Option<&str>) -> Url {
        let mut u = self.base.clone();

        // ws urls always have a host, so they can be a base
        if let Ok(mut segments) = u.path_segments_mut() {
            segments.pop_if_empty().push(&key.entity_id);
        }

        {
            let mut query = u.query_pairs_mut();
            query.append_pair("type", key.entity_type.as_str());
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }

        u
    }
}

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut url = Url::parse(s)
            .with_context(|_| parse_endpoint_error_variant::InvalidURL { s: s.to_string() })?;

        ensure!(
            url.scheme() == "wss" || url.scheme() == "ws",
            parse_endpoint_error_variant::InvalidSchema {
                s,
                schema: url.scheme(),
            }
        );

        ensure!(
            url.host().is_some(),
            parse_endpoint_error_variant::NoHost { s }
        );

        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { base: url })
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.base.fmt(f)
    }
}
