use serde::de::DeserializeOwned;
use serde_derive::Serialize;
use serde_json::{Map, Value};

use crate::config::Configuration;
use crate::errors::{Error, Result};
use crate::karma::{KarmaCashResponse, KarmaResponse, LeaderboardEntry, RewardItem};

pub const DEFAULT_LEADERBOARD_CATEGORY: &str = "overall";
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RedeemRequest<'a> {
    user_id: &'a str,
    reward_id: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct KarmaActionRequest<'a> {
    user_id: &'a str,
    action_type: &'a str,
    context: &'a Map<String, Value>,
}

/// Client for the karma/gamification service.
///
/// Every call comes in two flavours. The `try_*` methods report failures as
/// [`Error`]. The plain methods log the failure and hand back a fallback
/// value instead (default karma, empty lists, `false`), so a caller cannot
/// tell a new user from an unreachable service.
#[derive(Debug, Clone)]
pub struct KarmaClient {
    pub url: String,
    http: reqwest::Client,
}

impl KarmaClient {
    /// Create a new client pointing at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &impl Configuration) -> Self {
        Self::new(config.karma_api_url())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let endpoint = self.endpoint(path);
        let response = self.http.get(&endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status { endpoint, status });
        }
        Ok(response.json::<T>().await?)
    }

    async fn post_status<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let endpoint = self.endpoint(path);
        let response = self.http.post(&endpoint).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status { endpoint, status });
        }
        Ok(())
    }

    pub async fn try_get_user_karma(&self, user_id: &str) -> Result<KarmaResponse> {
        self.get_json(&format!("/api/v1/karma/{user_id}")).await
    }

    pub async fn try_get_user_karma_cash(&self, user_id: &str) -> Result<KarmaCashResponse> {
        self.get_json(&format!("/api/v1/karma-cash/{user_id}")).await
    }

    pub async fn try_get_rewards(&self) -> Result<Vec<RewardItem>> {
        self.get_json("/api/v1/karma-cash/rewards").await
    }

    pub async fn try_redeem_reward(&self, user_id: &str, reward_id: u64) -> Result<()> {
        let body = RedeemRequest { user_id, reward_id };
        self.post_status("/api/v1/karma-cash/redeem", &body).await
    }

    pub async fn try_record_karma_action(
        &self,
        user_id: &str,
        action_type: &str,
        context: &Map<String, Value>,
    ) -> Result<()> {
        let body = KarmaActionRequest {
            user_id,
            action_type,
            context,
        };
        self.post_status("/api/v1/karma/action", &body).await
    }

    pub async fn try_get_leaderboard(
        &self,
        category: &str,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>> {
        let endpoint = self.endpoint("/api/v1/leaderboard");
        let response = self
            .http
            .get(&endpoint)
            .query(&[("category", category.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status { endpoint, status });
        }
        Ok(response.json().await?)
    }

    pub async fn get_user_karma(&self, user_id: &str) -> KarmaResponse {
        self.try_get_user_karma(user_id).await.unwrap_or_else(|e| {
            log::error!("Error fetching karma: {e}");
            KarmaResponse::default()
        })
    }

    pub async fn get_user_karma_cash(&self, user_id: &str) -> KarmaCashResponse {
        self.try_get_user_karma_cash(user_id)
            .await
            .unwrap_or_else(|e| {
                log::error!("Error fetching karma cash: {e}");
                KarmaCashResponse::default()
            })
    }

    pub async fn get_rewards(&self) -> Vec<RewardItem> {
        self.try_get_rewards().await.unwrap_or_else(|e| {
            log::error!("Error fetching rewards: {e}");
            Vec::new()
        })
    }

    /// `true` only when the service accepted the redemption.
    pub async fn redeem_reward(&self, user_id: &str, reward_id: u64) -> bool {
        match self.try_redeem_reward(user_id, reward_id).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error redeeming reward: {e}");
                false
            }
        }
    }

    pub async fn record_karma_action(
        &self,
        user_id: &str,
        action_type: &str,
        context: &Map<String, Value>,
    ) -> bool {
        match self
            .try_record_karma_action(user_id, action_type, context)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error recording karma action: {e}");
                false
            }
        }
    }

    pub async fn get_leaderboard(&self, category: &str, limit: u32) -> Vec<LeaderboardEntry> {
        self.try_get_leaderboard(category, limit)
            .await
            .unwrap_or_else(|e| {
                log::error!("Error fetching leaderboard: {e}");
                Vec::new()
            })
    }

    /// Overall leaderboard, top ten.
    pub async fn get_default_leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.get_leaderboard(DEFAULT_LEADERBOARD_CATEGORY, DEFAULT_LEADERBOARD_LIMIT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    // Nothing listens on port 1, so connecting fails at the transport level.
    const UNREACHABLE: &str = "http://127.0.0.1:1";

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test]
    async fn user_karma_is_parsed() {
        init_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/karma/ACT1234560001")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "points": 340,
                    "level": 3,
                    "nextLevelPoints": 500,
                    "badges": [{
                        "id": 1,
                        "name": "First Report",
                        "description": "Reported your first hazard",
                        "icon": "flag",
                        "earned": true,
                        "points": 10
                    }],
                    "rank": "Helper"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = KarmaClient::new(server.url());
        let karma = client.get_user_karma("ACT1234560001").await;

        mock.assert_async().await;
        assert_eq!(karma.points, 340.0);
        assert_eq!(karma.level, 3);
        assert_eq!(karma.badges.len(), 1);
        assert_eq!(karma.rank, "Helper");
    }

    #[tokio::test]
    async fn loose_success_bodies_pass_through() {
        init_logger();
        let mut server = Server::new_async().await;
        let _cash = server
            .mock("GET", "/api/v1/karma-cash/u1")
            .with_status(200)
            .with_body(r#"{"balance":12.5,"transactions":[]}"#)
            .create_async()
            .await;
        let _karma = server
            .mock("GET", "/api/v1/karma/u1")
            .with_status(200)
            .with_body(
                json!({
                    "points": 340,
                    "level": 3,
                    "nextLevelPoints": 500,
                    "badges": [{"id": 4, "name": "Tree Planter", "points": 2.5}],
                    "rank": "Helper"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = KarmaClient::new(server.url());
        let cash = client.get_user_karma_cash("u1").await;
        assert_eq!(cash.balance, 12.5);

        let karma = client.get_user_karma("u1").await;
        assert_eq!(karma.points, 340.0);
        assert_eq!(karma.rank, "Helper");
        assert_eq!(karma.badges[0].name, "Tree Planter");
        assert!(karma.badges[0].icon.is_empty());
        assert!(!karma.badges[0].earned);
    }

    #[tokio::test]
    async fn user_karma_falls_back_on_error_status() {
        init_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/karma/u1")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = KarmaClient::new(server.url());
        assert_eq!(client.get_user_karma("u1").await, KarmaResponse::default());
        assert!(matches!(
            client.try_get_user_karma("u1").await,
            Err(Error::Status { status, .. }) if status.as_u16() == 503
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn user_karma_falls_back_when_unreachable() {
        init_logger();
        let client = KarmaClient::new(UNREACHABLE);
        assert_eq!(client.get_user_karma("u1").await, KarmaResponse::default());
        assert!(matches!(
            client.try_get_user_karma("u1").await,
            Err(Error::Http(_))
        ));
    }

    #[tokio::test]
    async fn malformed_body_falls_back() {
        init_logger();
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/karma-cash/u1")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let client = KarmaClient::new(server.url());
        assert_eq!(
            client.get_user_karma_cash("u1").await,
            KarmaCashResponse::default()
        );
    }

    #[tokio::test]
    async fn rewards_fall_back_to_empty() {
        init_logger();
        let client = KarmaClient::new(UNREACHABLE);
        assert!(client.get_rewards().await.is_empty());
    }

    #[tokio::test]
    async fn redeem_posts_camel_case_body() {
        init_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/karma-cash/redeem")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"userId": "u1", "rewardId": 7})))
            .with_status(204)
            .create_async()
            .await;

        let client = KarmaClient::new(format!("{}/", server.url()));
        assert!(client.redeem_reward("u1", 7).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn redeem_is_false_on_rejection() {
        init_logger();
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/karma-cash/redeem")
            .with_status(409)
            .create_async()
            .await;

        let client = KarmaClient::new(server.url());
        assert!(!client.redeem_reward("u1", 7).await);
        assert!(!KarmaClient::new(UNREACHABLE).redeem_reward("u1", 7).await);
    }

    #[tokio::test]
    async fn karma_action_sends_context() {
        init_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/karma/action")
            .match_body(Matcher::Json(json!({
                "userId": "u1",
                "actionType": "HAZARD_REPORT",
                "context": {"hazardId": 42}
            })))
            .with_status(200)
            .create_async()
            .await;

        let context = json!({"hazardId": 42}).as_object().cloned().unwrap_or_default();
        let client = KarmaClient::new(server.url());
        assert!(client.record_karma_action("u1", "HAZARD_REPORT", &context).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn leaderboard_passes_query() {
        init_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/leaderboard")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("category".into(), "overall".into()),
                Matcher::UrlEncoded("limit".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"userId":"u1","points":900},{"userId":"u2","points":850}]"#)
            .create_async()
            .await;

        let client = KarmaClient::new(server.url());
        let rows = client.get_default_leaderboard().await;
        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["userId"], "u1");
    }
}
