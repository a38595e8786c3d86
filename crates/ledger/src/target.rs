//! What a task points at, and how request fields become a target.

use std::sync::LazyLock;

use hive_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::task::TaskType;

static STATUS_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.|mobile\.)?(?:twitter\.com|x\.com)/[A-Za-z0-9_]+/status/(\d+)")
        .ok()
});

/// Target of a task, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TaskTarget {
    /// An existing tweet to view or like.
    Tweet { tweet_url: String, tweet_id: String },
    /// An existing tweet to reply to.
    Reply {
        tweet_url: String,
        tweet_id: String,
        reply_text: String,
    },
    /// A new tweet to publish.
    Post {
        post_topic: Option<String>,
        post_content: Option<String>,
    },
}

/// Raw request fields a target is built from.
#[derive(Debug, Clone, Default)]
pub struct TargetFields {
    pub tweet_url: Option<String>,
    pub reply_text: Option<String>,
    pub post_content: Option<String>,
    pub post_topic: Option<String>,
}

impl TaskTarget {
    /// Build and validate the target for `task_type`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a required field is missing or the
    /// tweet url is not a status url.
    pub fn from_fields(task_type: TaskType, fields: TargetFields) -> Result<Self> {
        match task_type {
            TaskType::ViewTweet | TaskType::LikeTweet => {
                let tweet_url = required(fields.tweet_url, "tweet_url")?;
                let tweet_id = parse_tweet_id(&tweet_url)?;
                Ok(Self::Tweet {
                    tweet_url,
                    tweet_id,
                })
            }
            TaskType::ReplyTweet => {
                let tweet_url = required(fields.tweet_url, "tweet_url")?;
                let tweet_id = parse_tweet_id(&tweet_url)?;
                let reply_text = required(fields.reply_text, "reply_text")?;
                Ok(Self::Reply {
                    tweet_url,
                    tweet_id,
                    reply_text,
                })
            }
            TaskType::PostTweet => {
                let post_content = non_blank(fields.post_content);
                let post_topic = non_blank(fields.post_topic);
                if post_content.is_none() && post_topic.is_none() {
                    return Err(Error::invalid_field(
                        "post_content",
                        "post_content or post_topic required",
                    ));
                }
                Ok(Self::Post {
                    post_topic,
                    post_content,
                })
            }
        }
    }

    /// Human readable instruction for the executor.
    #[must_use]
    pub fn describe(&self, task_type: TaskType) -> String {
        match (self, task_type) {
            (Self::Tweet { tweet_url, .. }, TaskType::LikeTweet) => format!("Like tweet {tweet_url}"),
            (Self::Tweet { tweet_url, .. }, _) => format!("View tweet {tweet_url}"),
            (Self::Reply { tweet_url, .. }, _) => format!("Reply to tweet {tweet_url}"),
            (Self::Post { post_topic: Some(topic), .. }, _) => format!("Post a tweet about {topic}"),
            (Self::Post { .. }, _) => "Post the provided tweet".to_string(),
        }
    }
}

/// Extract the numeric status id from a twitter.com or x.com status url.
///
/// # Errors
///
/// Returns a validation error for any other url shape.
pub fn parse_tweet_id(url: &str) -> Result<String> {
    STATUS_URL
        .as_ref()
        .and_then(|re| re.captures(url.trim()))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::invalid_field("tweet_url", format!("invalid tweet url: {url}")))
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| Error::missing_field(field))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_tweet_id_accepts_both_hosts() {
        assert_eq!(
            parse_tweet_id("https://twitter.com/someone/status/1234567890").unwrap(),
            "1234567890"
        );
        assert_eq!(
            parse_tweet_id("https://x.com/some_one/status/42?s=20").unwrap(),
            "42"
        );
        assert_eq!(
            parse_tweet_id("http://mobile.twitter.com/a/status/7").unwrap(),
            "7"
        );
    }

    #[test]
    fn test_parse_tweet_id_rejects_malformed() {
        for url in [
            "",
            "not a url",
            "https://example.com/a/status/1",
            "https://x.com/a/status/abc",
            "https://x.com/a",
        ] {
            let result = parse_tweet_id(url);
            assert!(matches!(result, Err(Error::Validation { .. })), "{url}");
        }
    }

    #[test]
    fn test_reply_requires_text() {
        let result = TaskTarget::from_fields(
            TaskType::ReplyTweet,
            TargetFields {
                tweet_url: Some("https://x.com/a/status/1".into()),
                ..TargetFields::default()
            },
        );
        assert!(matches!(result, Err(Error::Validation { ref message, .. }) if message == "reply_text required"));
    }

    #[test]
    fn test_post_requires_content_or_topic() {
        let missing = TaskTarget::from_fields(TaskType::PostTweet, TargetFields::default());
        assert!(missing.is_err());

        let topic_only = TaskTarget::from_fields(
            TaskType::PostTweet,
            TargetFields {
                post_topic: Some("rust".into()),
                ..TargetFields::default()
            },
        )
        .unwrap();
        assert_eq!(topic_only.describe(TaskType::PostTweet), "Post a tweet about rust");
    }

    #[test]
    fn test_view_target_serializes_tagged() {
        let target = TaskTarget::from_fields(
            TaskType::ViewTweet,
            TargetFields {
                tweet_url: Some("https://x.com/a/status/99".into()),
                ..TargetFields::default()
            },
        )
        .unwrap();

        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["kind"], "tweet");
        assert_eq!(json["tweetId"], "99");
        assert_eq!(json["tweetUrl"], "https://x.com/a/status/99");
    }
}
