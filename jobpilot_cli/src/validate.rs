use crate::input::{OracleKey, RunInput};
use jobpilot::llm::DEFAULT_ANTHROPIC_MODEL;
use jobpilot::{AnthropicProvider, ConfigError};

/// Warnings from an input that passed validation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Validation {
    pub warnings: Vec<String>,
}

/// Check an input the way a run would before touching the browser: oracle
/// key, identity fields, then the cookie sets. One usable set is enough.
pub fn validate(input: &RunInput) -> Result<Validation, ConfigError> {
    let mut report = Validation::default();

    let key = input.oracle_key()?;
    input.profile().validate()?;

    if input.linkedin_cookies.is_none() && input.indeed_cookies.is_none() {
        return Err(ConfigError::NoCredentials);
    }
    let credentials = input.credentials();
    for platform in credentials.platforms() {
        if credentials.cookies_for(platform).is_empty() {
            report
                .warnings
                .push(format!("{} cookies array is empty", platform));
        }
    }
    for (platform, detail) in credentials.malformed() {
        report.warnings.push(format!(
            "{} cookies are invalid ({}) - its jobs will be skipped",
            platform, detail
        ));
    }
    credentials.validate()?;

    if let OracleKey::Anthropic(key) = &key {
        if !AnthropicProvider::new(key.as_str(), DEFAULT_ANTHROPIC_MODEL).has_expected_key_prefix() {
            report
                .warnings
                .push("API key does not start with \"sk-ant-\" - might be invalid".to_string());
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobpilot::Cookie;

    fn input() -> RunInput {
        RunInput {
            anthropic_api_key: Some("sk-ant-api03-xyz".into()),
            linkedin_cookies: Some(vec![Cookie::new("li_at", "t", ".linkedin.com")]),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            max_jobs_to_process: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_input() {
        assert_eq!(validate(&input()).unwrap(), Validation::default());
    }

    #[test]
    fn test_required_fields() {
        let missing_key = RunInput {
            anthropic_api_key: None,
            ..input()
        };
        assert!(matches!(
            validate(&missing_key),
            Err(ConfigError::MissingApiKey)
        ));

        let missing_name = RunInput {
            last_name: String::new(),
            ..input()
        };
        assert!(matches!(
            validate(&missing_name),
            Err(ConfigError::MissingField("lastName"))
        ));
    }

    #[test]
    fn test_cookie_checks() {
        let none = RunInput {
            linkedin_cookies: None,
            ..input()
        };
        assert!(matches!(validate(&none), Err(ConfigError::NoCredentials)));

        let broken = RunInput {
            indeed_cookies: Some(vec![Cookie::new("CTK", "", ".indeed.com")]),
            ..input()
        };
        let report = validate(&broken).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("indeed cookies are invalid"));

        let all_broken = RunInput {
            linkedin_cookies: Some(vec![Cookie::new("li_at", "t", "")]),
            ..input()
        };
        assert!(matches!(
            validate(&all_broken),
            Err(ConfigError::InvalidCookies { ref platform, .. }) if platform == "linkedin"
        ));

        let empty_extra = RunInput {
            indeed_cookies: Some(vec![]),
            ..input()
        };
        let report = validate(&empty_extra).unwrap();
        assert_eq!(report.warnings, vec!["indeed cookies array is empty".to_string()]);

        let only_empty = RunInput {
            linkedin_cookies: Some(vec![]),
            ..input()
        };
        assert!(matches!(validate(&only_empty), Err(ConfigError::NoCredentials)));
    }

    #[test]
    fn test_key_prefix_warning() {
        let odd_key = RunInput {
            anthropic_api_key: Some("not-a-real-key".into()),
            ..input()
        };
        let report = validate(&odd_key).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("sk-ant-"));

        let openai = RunInput {
            anthropic_api_key: None,
            openai_api_key: Some("sk-proj-1".into()),
            ..input()
        };
        assert!(validate(&openai).unwrap().warnings.is_empty());
    }
}
