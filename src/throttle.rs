//! Request throttling per client class.
//!
//! Anonymous clients are keyed by address, authenticated clients by user id.
//! A throttle only counts requests from its own class; some also ignore
//! certain HTTP methods.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    DefaultKeyedRateLimiter, Quota, RateLimiter,
    clock::{Clock, DefaultClock},
};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{TokenType, bearer_token};
use crate::config::ThrottleSettings;
use crate::schemas::{AppState, error_response};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateParseError {
    #[error("rate '{0}' must look like N/s, N/m, N/h or N/d")]
    Format(String),
    #[error("rate '{0}' must allow at least one request")]
    Zero(String),
}

/// A ceiling of `requests` per `period`, parsed from strings such as `10/m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub requests: NonZeroU32,
    pub period: Duration,
}

impl FromStr for Rate {
    type Err = RateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || RateParseError::Format(s.to_string());
        let (count, unit) = s.trim().split_once('/').ok_or_else(format_err)?;
        let count: u32 = count.trim().parse().map_err(|_| format_err())?;
        let requests = NonZeroU32::new(count).ok_or_else(|| RateParseError::Zero(s.to_string()))?;

        // Only the first letter of the unit matters ("m", "min" and "minute" are equal)
        let period = match unit.trim().chars().next() {
            Some('s') => Duration::from_secs(1),
            Some('m') => Duration::from_secs(60),
            Some('h') => Duration::from_secs(60 * 60),
            Some('d') => Duration::from_secs(24 * 60 * 60),
            _ => return Err(format_err()),
        };

        Ok(Rate { requests, period })
    }
}

impl Rate {
    /// A quota that allows the full `requests` as a burst and refills evenly over `period`.
    fn quota(&self) -> Quota {
        let replenish = self.period / self.requests.get();
        match Quota::with_period(replenish) {
            Some(quota) => quota.allow_burst(self.requests),
            None => Quota::per_second(self.requests),
        }
    }
}

/// Who is making a request, as far as throttling is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Client {
    Anonymous(String),
    User(i32),
}

impl Client {
    fn key(&self) -> String {
        match self {
            Client::Anonymous(addr) => format!("anon:{}", addr),
            Client::User(id) => format!("user:{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientClass {
    Anonymous,
    Authenticated,
}

/// Which requests a throttle counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRule {
    All,
    /// GET requests pass freely
    SkipGet,
    /// Only POST requests are counted
    PostOnly,
}

pub struct Throttle {
    scope: &'static str,
    class: ClientClass,
    methods: MethodRule,
    limiter: DefaultKeyedRateLimiter<String>,
}

impl Throttle {
    pub fn new(scope: &'static str, class: ClientClass, methods: MethodRule, rate: Rate) -> Self {
        Self {
            scope,
            class,
            methods,
            limiter: RateLimiter::keyed(rate.quota()),
        }
    }

    fn applies(&self, client: &Client, method: &Method) -> bool {
        let class_matches = matches!(
            (self.class, client),
            (ClientClass::Anonymous, Client::Anonymous(_)) | (ClientClass::Authenticated, Client::User(_))
        );
        let method_matches = match self.methods {
            MethodRule::All => true,
            MethodRule::SkipGet => method != Method::GET,
            MethodRule::PostOnly => method == Method::POST,
        };
        class_matches && method_matches
    }

    /// `Err` carries how long the client has to wait.
    pub fn check(&self, client: &Client, method: &Method) -> Result<(), Duration> {
        if !self.applies(client, method) {
            return Ok(());
        }
        self.limiter.check_key(&client.key()).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            warn!("Throttle '{}' rejected {:?}, retry in {:?}", self.scope, client, wait);
            wait
        })
    }
}

/// Route groups a throttle set is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every API route
    Global,
    /// Demo routes
    Simple,
    /// Sign-in and registration
    NoReads,
    /// Write routes
    StrictPost,
    /// Authenticated routes
    Daily,
}

pub struct Throttles {
    enabled: bool,
    anon: Throttle,
    auth: Throttle,
    simple: Throttle,
    no_reads: Throttle,
    strict_post: Throttle,
    daily: Throttle,
}

impl std::fmt::Debug for Throttles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttles").field("enabled", &self.enabled).finish_non_exhaustive()
    }
}

impl Throttles {
    pub fn from_settings(settings: &ThrottleSettings) -> Result<Self, RateParseError> {
        use ClientClass::{Anonymous, Authenticated};

        Ok(Self {
            enabled: settings.enabled,
            anon: Throttle::new("anon", Anonymous, MethodRule::All, settings.anon.parse()?),
            auth: Throttle::new("auth", Authenticated, MethodRule::All, settings.auth.parse()?),
            simple: Throttle::new("simple", Anonymous, MethodRule::All, settings.simple.parse()?),
            no_reads: Throttle::new("no_reads", Anonymous, MethodRule::SkipGet, settings.no_reads.parse()?),
            strict_post: Throttle::new(
                "strict_post",
                Authenticated,
                MethodRule::PostOnly,
                settings.strict_post.parse()?,
            ),
            daily: Throttle::new("daily", Authenticated, MethodRule::All, settings.daily.parse()?),
        })
    }

    pub fn check(&self, scope: Scope, client: &Client, method: &Method) -> Result<(), Duration> {
        if !self.enabled {
            return Ok(());
        }
        match scope {
            Scope::Global => {
                self.anon.check(client, method)?;
                self.auth.check(client, method)
            }
            Scope::Simple => self.simple.check(client, method),
            Scope::NoReads => self.no_reads.check(client, method),
            Scope::StrictPost => self.strict_post.check(client, method),
            Scope::Daily => self.daily.check(client, method),
        }
    }
}

fn client_address(request: &Request) -> String {
    forwarded_for(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Authenticated when the request carries a valid access token.
fn identify(state: &AppState, request: &Request) -> Client {
    bearer_token(request.headers())
        .and_then(|token| state.auth.validate(token, TokenType::Access))
        .and_then(|claims| claims.user_id())
        .map(Client::User)
        .unwrap_or_else(|| Client::Anonymous(client_address(request)))
}

fn throttled(wait: Duration) -> Response {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    let secs = secs.max(1);
    let mut response = error_response(
        StatusCode::TOO_MANY_REQUESTS,
        "THROTTLED",
        &format!("Request was throttled. Expected available in {} seconds.", secs),
    )
    .into_response();
    if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    response
}

async fn enforce(state: &AppState, scope: Scope, request: Request, next: Next) -> Response {
    let client = identify(state, &request);
    match state.throttles.check(scope, &client, request.method()) {
        Ok(()) => {
            debug!("{:?} passed {:?} throttle", client, scope);
            next.run(request).await
        }
        Err(wait) => throttled(wait),
    }
}

pub async fn global(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(&state, Scope::Global, request, next).await
}

pub async fn simple(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(&state, Scope::Simple, request, next).await
}

pub async fn no_reads(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(&state, Scope::NoReads, request, next).await
}

pub async fn strict_post(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(&state, Scope::StrictPost, request, next).await
}

pub async fn daily(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(&state, Scope::Daily, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(s: &str) -> Rate {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_rates() {
        assert_eq!(rate("10/m").period, Duration::from_secs(60));
        assert_eq!(rate("10/m").requests.get(), 10);
        assert_eq!(rate("10/s").period, Duration::from_secs(1));
        assert_eq!(rate("5/hour").period, Duration::from_secs(3600));
        assert_eq!(rate("10000/d").period, Duration::from_secs(86400));
    }

    #[test]
    fn test_reject_bad_rates() {
        assert!(matches!("10".parse::<Rate>(), Err(RateParseError::Format(_))));
        assert!(matches!("x/m".parse::<Rate>(), Err(RateParseError::Format(_))));
        assert!(matches!("10/w".parse::<Rate>(), Err(RateParseError::Format(_))));
        assert!(matches!("0/m".parse::<Rate>(), Err(RateParseError::Zero(_))));
    }

    #[test]
    fn test_throttle_allows_burst_then_rejects() {
        let throttle = Throttle::new("test", ClientClass::Anonymous, MethodRule::All, rate("3/m"));
        let client = Client::Anonymous("10.0.0.1".to_string());
        for _ in 0..3 {
            assert!(throttle.check(&client, &Method::GET).is_ok());
        }
        let wait = throttle.check(&client, &Method::GET).unwrap_err();
        assert!(wait <= Duration::from_secs(20));

        // Another address has its own allowance
        let other = Client::Anonymous("10.0.0.2".to_string());
        assert!(throttle.check(&other, &Method::GET).is_ok());
    }

    #[test]
    fn test_throttle_ignores_other_class() {
        let throttle = Throttle::new("test", ClientClass::Anonymous, MethodRule::All, rate("1/m"));
        let user = Client::User(1);
        for _ in 0..5 {
            assert!(throttle.check(&user, &Method::GET).is_ok());
        }
    }

    #[test]
    fn test_method_rules() {
        let no_reads = Throttle::new("no_reads", ClientClass::Anonymous, MethodRule::SkipGet, rate("1/m"));
        let client = Client::Anonymous("10.0.0.1".to_string());
        for _ in 0..5 {
            assert!(no_reads.check(&client, &Method::GET).is_ok());
        }
        assert!(no_reads.check(&client, &Method::POST).is_ok());
        assert!(no_reads.check(&client, &Method::PUT).is_err());

        let strict = Throttle::new("strict", ClientClass::Authenticated, MethodRule::PostOnly, rate("1/m"));
        let user = Client::User(9);
        assert!(strict.check(&user, &Method::POST).is_ok());
        assert!(strict.check(&user, &Method::POST).is_err());
        assert!(strict.check(&user, &Method::DELETE).is_ok());
    }

    #[test]
    fn test_disabled_throttles_pass_everything() {
        let settings = ThrottleSettings {
            enabled: false,
            anon: "1/d".to_string(),
            ..Default::default()
        };
        let throttles = Throttles::from_settings(&settings).unwrap();
        let client = Client::Anonymous("10.0.0.1".to_string());
        for _ in 0..5 {
            assert!(throttles.check(Scope::Global, &client, &Method::GET).is_ok());
        }
    }

    #[test]
    fn test_forwarded_for_uses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(forwarded_for(&headers).as_deref(), Some("203.0.113.7"));
        assert_eq!(forwarded_for(&HeaderMap::new()), None);
    }
}
