//! Command-line argument parsing.

use std::path::PathBuf;

use anyhow::{bail, Result};

pub const USAGE: &str = "\
Usage: clipfeed <command> [args]

Commands:
  login [username]                 Sign in (prompts for password)
  register <username> <email>      Create an account and sign in
  logout                           Sign out and forget the stored session
  whoami                           Show the signed-in user
  videos                           List public videos
  feed                             List videos from users you follow
  play <video-id>                  Print a playable URL for a video
  upload <file> --title <title> [--recipe <text>] [--private]
                                   Upload a video
  profile <user-id>                Show a user's profile and videos
  follow <user-id>                 Follow a user
  unfollow <user-id>               Unfollow a user
  help                             Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: Option<String> },
    Register { username: String, email: String },
    Logout,
    WhoAmI,
    Videos,
    Feed,
    Play { video_id: String },
    Upload {
        file: PathBuf,
        title: String,
        recipe: Option<String>,
        private: bool,
    },
    Profile { user_id: String },
    Follow { user_id: String },
    Unfollow { user_id: String },
    Help,
}

impl Command {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        let command = match name.as_str() {
            "login" => Command::Login {
                username: rest.first().cloned(),
            },
            "register" => match rest {
                [username, email, ..] => Command::Register {
                    username: username.clone(),
                    email: email.clone(),
                },
                _ => bail!("register needs <username> <email>"),
            },
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "videos" => Command::Videos,
            "feed" => Command::Feed,
            "play" => Command::Play {
                video_id: Self::required(rest, "play", "video-id")?,
            },
            "upload" => Self::parse_upload(rest)?,
            "profile" => Command::Profile {
                user_id: Self::required(rest, "profile", "user-id")?,
            },
            "follow" => Command::Follow {
                user_id: Self::required(rest, "follow", "user-id")?,
            },
            "unfollow" => Command::Unfollow {
                user_id: Self::required(rest, "unfollow", "user-id")?,
            },
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("Unknown command: {}", other),
        };
        Ok(command)
    }

    fn required(rest: &[String], command: &str, what: &str) -> Result<String> {
        match rest.first() {
            Some(value) if !value.trim().is_empty() => Ok(value.clone()),
            _ => bail!("{} needs <{}>", command, what),
        }
    }

    fn parse_upload(rest: &[String]) -> Result<Self> {
        let mut file = None;
        let mut title = None;
        let mut recipe = None;
        let mut private = false;

        let mut iter = rest.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--title" => title = iter.next().cloned(),
                "--recipe" => recipe = iter.next().cloned(),
                "--private" => private = true,
                flag if flag.starts_with("--") => bail!("Unknown upload option: {}", flag),
                path if file.is_none() => file = Some(PathBuf::from(path)),
                extra => bail!("Unexpected argument: {}", extra),
            }
        }

        let Some(file) = file else {
            bail!("upload needs a video file");
        };
        let Some(title) = title.filter(|t| !t.trim().is_empty()) else {
            bail!("Title is required (--title)");
        };
        Ok(Command::Upload {
            file,
            title,
            recipe,
            private,
        })
    }

    /// Commands that need the stored session checked with the server first.
    /// Logout only forgets local state and never waits on the network.
    pub fn requires_verification(&self) -> bool {
        !matches!(self, Command::Logout | Command::Help)
    }

    /// Commands that only make sense for a signed-in user.
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. } | Command::Register { .. } | Command::Logout | Command::Help
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse(&args(&[])).unwrap(), Command::Help);
        assert_eq!(Command::parse(&args(&["feed"])).unwrap(), Command::Feed);
        assert_eq!(
            Command::parse(&args(&["login"])).unwrap(),
            Command::Login { username: None }
        );
        assert_eq!(
            Command::parse(&args(&["play", "v1"])).unwrap(),
            Command::Play { video_id: "v1".to_string() }
        );
    }

    #[test]
    fn test_parse_missing_arguments() {
        assert!(Command::parse(&args(&["play"])).is_err());
        assert!(Command::parse(&args(&["register", "bob"])).is_err());
        assert!(Command::parse(&args(&["dance"])).is_err());
    }

    #[test]
    fn test_parse_upload() {
        let cmd = Command::parse(&args(&[
            "upload", "clip.mp4", "--title", "Ramen", "--recipe", "noodles", "--private",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::Upload {
                file: PathBuf::from("clip.mp4"),
                title: "Ramen".to_string(),
                recipe: Some("noodles".to_string()),
                private: true,
            }
        );

        assert!(Command::parse(&args(&["upload", "clip.mp4"])).is_err());
        assert!(Command::parse(&args(&["upload", "--title", "x"])).is_err());
        assert!(Command::parse(&args(&["upload", "a.mp4", "b.mp4", "--title", "x"])).is_err());
    }

    #[test]
    fn test_requires_session() {
        assert!(Command::Feed.requires_session());
        assert!(Command::Play { video_id: "v".into() }.requires_session());
        assert!(!Command::Logout.requires_session());
        assert!(!Command::Login { username: None }.requires_session());
    }

    #[test]
    fn test_logout_skips_verification() {
        assert!(!Command::Logout.requires_verification());
        assert!(!Command::Help.requires_verification());
        assert!(Command::Login { username: None }.requires_verification());
        assert!(Command::Feed.requires_verification());
    }
}
