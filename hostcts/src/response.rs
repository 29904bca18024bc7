use std::collections::HashSet;

use serde::Serialize;

use crate::Error;

/// The text a device printed in reply to a `pm`, `am` or `dpm` command.
///
/// These commands report their outcome in the text itself: a reply starting
/// with `Success` worked, anything else is the failure reason. This is the
/// only place that knows that convention.
#[derive(Debug, Clone, Copy)]
pub struct Reply<'a> {
    text: &'a str,
}

impl<'a> Reply<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.text.starts_with("Success")
    }

    /// Like [Reply::is_success] but for commands that print `Success: <payload>`
    #[inline]
    pub fn is_success_with_payload(&self) -> bool {
        self.text.starts_with("Success:")
    }

    /// Whether a `Success` line appears anywhere in the reply. `pm install`
    /// prints transfer progress before the status line.
    pub fn has_success_line(&self) -> bool {
        self.is_success() || self.text.contains("\nSuccess")
    }

    /// Fail with an [Error::Assertion] naming `what` unless the reply starts
    /// with `Success`
    pub fn expect_success(&self, what: &str) -> crate::Result<&'a str> {
        if self.is_success() {
            Ok(self.text)
        } else {
            Err(Error::Assertion(format!(
                "{} failed: {}",
                what,
                self.text.trim()
            )))
        }
    }

    /// Fail with an [Error::Assertion] naming `what` if the reply starts with
    /// `Success`
    pub fn expect_failure(&self, what: &str) -> crate::Result<&'a str> {
        if self.is_success() {
            Err(Error::Assertion(format!(
                "{} unexpectedly succeeded: {}",
                what,
                self.text.trim()
            )))
        } else {
            Ok(self.text)
        }
    }
}

/// Parse the session id out of a `pm install-create` reply such as
/// `Success: created install session [12345]`.
///
/// The id is the content of the last `[`...`]` pair.
pub fn parse_session_id(text: &str) -> crate::Result<i64> {
    let end = text
        .rfind(']')
        .ok_or_else(|| Error::Harness(format!("no session id in reply: {}", text.trim())))?;
    let start = text[..end]
        .rfind('[')
        .ok_or_else(|| Error::Harness(format!("no session id in reply: {}", text.trim())))?;
    let inner = text[start + 1..end].trim();
    let id = inner
        .parse::<i64>()
        .map_err(|_| Error::Harness(format!("invalid session id `{}` in reply: {}", inner, text.trim())))?;
    crate::ensure!(
        id >= 0,
        "failed to create install session: {}",
        text.trim()
    );
    Ok(id)
}

/// Parse the id of a new user out of a `pm create-user` reply such as
/// `Success: created user id 10`.
pub fn parse_created_user_id(text: &str) -> crate::Result<i32> {
    let mut tokens = text.split_whitespace();
    match tokens.next() {
        Some("Success:") => {}
        _ => {
            return Err(Error::Harness(format!(
                "expected reply of the form `Success: ... <id>`, got: {}",
                text.trim()
            )))
        }
    }
    let last = tokens
        .last()
        .ok_or_else(|| Error::Harness(format!("no user id in reply: {}", text.trim())))?;
    last.parse::<i32>()
        .map_err(|_| Error::Harness(format!("invalid user id `{}` in reply: {}", last, text.trim())))
}

/// One line of `pm list users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEntry {
    pub id: i32,
    pub name: String,
    pub running: bool,
}

/// Parse `pm list users` output:
///
/// ```text
/// Users:
///     UserInfo{0:Owner:13} running
///     UserInfo{10:TestUser_1:0}
/// ```
pub fn parse_user_list(text: &str) -> crate::Result<Vec<UserEntry>> {
    let mut lines = text.lines().filter(|it| !it.trim().is_empty());
    match lines.next() {
        Some(first) if first.trim_end() == "Users:" => {}
        _ => {
            return Err(Error::Assertion(format!(
                "expected `pm list users` output to start with `Users:`, got: {}",
                text.trim()
            )))
        }
    }

    let mut users = Vec::new();
    for line in lines {
        let mut tokens: Vec<&str> = line.split(['{', '}', ':']).collect();
        while tokens.last().map_or(false, |it| it.is_empty()) {
            tokens.pop();
        }
        if tokens.len() != 4 && tokens.len() != 5 {
            return Err(Error::Assertion(format!(
                "user line `{}` doesn't contain 4 or 5 tokens",
                line.trim()
            )));
        }
        let id = tokens[1].trim().parse::<i32>().map_err(|_| {
            Error::Assertion(format!("invalid user id in line `{}`", line.trim()))
        })?;
        let running = tokens.len() == 5 && tokens[4].contains("running");
        users.push(UserEntry {
            id,
            name: tokens[2].into(),
            running,
        });
    }
    Ok(users)
}

/// Find the serial number of `user_id` in `dumpsys user` output, where users
/// appear as `UserInfo{0:Owner:13} serialNo=0`
pub fn parse_user_serial(text: &str, user_id: i32) -> crate::Result<i32> {
    let needle = format!("UserInfo{{{}:", user_id);
    for line in text.lines() {
        let line = line.trim();
        if !line.contains(&needle) {
            continue;
        }
        let parts: Vec<&str> = line.split("serialNo=").collect();
        if parts.len() != 2 {
            return Err(Error::Assertion(format!(
                "expected one serialNo= in `{}`",
                line
            )));
        }
        return parts[1].trim().parse::<i32>().map_err(|_| {
            Error::Assertion(format!("invalid serial number in `{}`", line))
        });
    }
    Err(Error::Assertion(format!("couldn't find user {}", user_id)))
}

/// Parse `pm get-max-users`, which prints `Maximum supported users: 4`
pub fn parse_max_users(text: &str) -> crate::Result<i32> {
    let trimmed = text.trim();
    let tail = match trimmed.rfind(' ') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };
    tail.parse::<i32>()
        .map_err(|_| Error::Assertion(format!("failed to parse result: {}", trimmed)))
}

/// Parse `pm list features`, one `feature:<name>` per line
pub fn parse_features(text: &str) -> crate::Result<HashSet<String>> {
    let mut features = HashSet::new();
    for token in text.split_whitespace() {
        match token.split_once(':') {
            Some(("feature", name)) if !name.is_empty() => {
                features.insert(name.to_string());
            }
            _ => {
                return Err(Error::Assertion(format!(
                    "\"{}\" expected to have format feature:{{FEATURE_VALUE}}",
                    token
                )))
            }
        }
    }
    Ok(features)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("Success: created install session [12345]", 12345)]
    #[case("Success: [12345]", 12345)]
    #[case("[1] Success: created install session [ 77 ]\n", 77)]
    fn test_parse_session_id(#[case] reply: &str, #[case] expected: i64) {
        assert_eq!(parse_session_id(reply).unwrap(), expected);
    }

    #[rstest]
    #[case("Success: created install session")]
    #[case("Success: created install session [abc]")]
    #[case("Error: ]broken[")]
    #[case("")]
    fn test_parse_session_id_fails_fast(#[case] reply: &str) {
        assert!(matches!(parse_session_id(reply), Err(Error::Harness(_))));
    }

    #[rstest]
    #[case("Success: created install session [-1]")]
    #[case("Success: [-42]\n")]
    fn test_negative_session_id_rejected(#[case] reply: &str) {
        let err = parse_session_id(reply).unwrap_err();
        assert!(err.is_assertion(), "{:?}", err);
        assert!(err.to_string().contains("failed to create install session"));
    }

    #[rstest]
    fn test_session_zero_accepted() {
        assert_eq!(parse_session_id("Success: [0]").unwrap(), 0);
    }

    #[rstest]
    fn test_parse_created_user_id() {
        assert_eq!(
            parse_created_user_id("Success: created user id 11\n").unwrap(),
            11
        );
        assert!(matches!(
            parse_created_user_id("Error: couldn't create User."),
            Err(Error::Harness(_))
        ));
        assert!(matches!(
            parse_created_user_id("Success: created user id eleven"),
            Err(Error::Harness(_))
        ));
    }

    #[rstest]
    fn test_reply_success() {
        assert!(Reply::new("Success").is_success());
        assert!(Reply::new("Success: created user id 10").is_success_with_payload());
        assert!(!Reply::new("  Success: created user id 10").is_success_with_payload());
        assert!(!Reply::new("\nSuccess").is_success());
        assert!(!Reply::new("Success").is_success_with_payload());
        assert!(!Reply::new("Failure [INSTALL_FAILED_INVALID_APK]").is_success());
        assert!(Reply::new("pkg: /data/local/tmp/a.apk\nSuccess\n").has_success_line());

        let err = Reply::new("Failure [DUPLICATE]")
            .expect_success("install-commit")
            .unwrap_err();
        assert!(err.is_assertion());
        assert!(err.to_string().contains("DUPLICATE"));
        assert!(Reply::new("Success").expect_failure("install-commit").is_err());
    }

    #[rstest]
    fn test_parse_user_list() {
        let out = "Users:\n\tUserInfo{0:Owner:13} running\n\tUserInfo{10:TestUser_1:0}\n";
        let users = parse_user_list(out).unwrap();
        assert_eq!(
            users,
            vec![
                UserEntry {
                    id: 0,
                    name: "Owner".into(),
                    running: true
                },
                UserEntry {
                    id: 10,
                    name: "TestUser_1".into(),
                    running: false
                },
            ]
        );

        assert!(parse_user_list("Nope:\n").unwrap_err().is_assertion());
        assert!(parse_user_list("Users:\n\tUserInfo{0:Owner}\n")
            .unwrap_err()
            .is_assertion());
    }

    #[rstest]
    fn test_parse_user_serial() {
        let out = "Users:\n  UserInfo{0:Owner:13} serialNo=0\n  UserInfo{10:TestUser:0} serialNo=14\n";
        assert_eq!(parse_user_serial(out, 10).unwrap(), 14);
        assert_eq!(parse_user_serial(out, 0).unwrap(), 0);
        assert!(parse_user_serial(out, 1).unwrap_err().is_assertion());
    }

    #[rstest]
    fn test_parse_max_users_and_features() {
        assert_eq!(parse_max_users("Maximum supported users: 4\n").unwrap(), 4);
        assert!(parse_max_users("Maximum supported users: lots").is_err());

        let features =
            parse_features("feature:android.software.live_tv\nfeature:reqGlEsVersion=0x30000\n")
                .unwrap();
        assert!(features.contains("android.software.live_tv"));
        assert!(features.contains("reqGlEsVersion=0x30000"));
        assert!(parse_features("android.software.live_tv").is_err());
    }
}
