use std::time::Duration;
use std::{env, fs};

use octofhir_labwatch::config::loader::{load_config, load_unvalidated};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("labwatch.toml");

    let toml_content = r#"
[auth]
client_id = "0f8c1b2a-client"
token_endpoint = "https://fhir.example.org/oauth2/token"
jwks_path = "keys.json"
assertion_lifetime = "3m"

[export]
fhir_base_url = "https://fhir.example.org/api/FHIR/R4"
group_id = "e3iabhmS8rsueyz7vaimuiaSmfGvi.QwjVXJANlPOgR83"
poll_interval = "5s"
max_poll_attempts = 100

[email]
smtp_host = "smtp.example.org"
smtp_port = 2525
from = "Lab Watch <labs@clinic.example>"
to = ["doctor@clinic.example"]

[schedule]
cron = "30 6 * * 1-5"

[jwks]
bind = "127.0.0.1:3100"

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");
    let path_str = path.to_str();

    // 1) Valid config parses
    let cfg = load_config(path_str).expect("should parse config");
    assert_eq!(cfg.auth.client_id, "0f8c1b2a-client");
    assert_eq!(cfg.auth.assertion_lifetime, Duration::from_secs(180));
    assert_eq!(cfg.export.poll_interval, Duration::from_secs(5));
    assert_eq!(cfg.export.max_poll_attempts, Some(100));
    assert_eq!(cfg.export.types, ["Patient", "Observation"]);
    assert_eq!(cfg.email.smtp_port, 2525);
    assert!(cfg.email.starttls);
    assert_eq!(cfg.schedule.cron, "30 6 * * 1-5");
    assert_eq!(cfg.jwks.addr().unwrap().port(), 3100);
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("LABWATCH__EMAIL__SMTP_PASSWORD", "s3cret");
        env::set_var("LABWATCH__EMAIL__SMTP_USERNAME", "mailer");
        env::set_var("LABWATCH__EXPORT__MAX_POLL_ATTEMPTS", "7");
        env::set_var("LABWATCH__EMAIL__TO", "a@clinic.example,b@clinic.example");
    }
    let cfg_env = load_config(path_str).expect("should parse config with env overrides");
    assert_eq!(cfg_env.email.smtp_password.as_deref(), Some("s3cret"));
    assert_eq!(cfg_env.email.smtp_username.as_deref(), Some("mailer"));
    assert_eq!(cfg_env.export.max_poll_attempts, Some(7));
    assert_eq!(cfg_env.email.to, ["a@clinic.example", "b@clinic.example"]);
    // cleanup env vars
    unsafe {
        env::remove_var("LABWATCH__EMAIL__SMTP_PASSWORD");
        env::remove_var("LABWATCH__EMAIL__SMTP_USERNAME");
        env::remove_var("LABWATCH__EXPORT__MAX_POLL_ATTEMPTS");
        env::remove_var("LABWATCH__EMAIL__TO");
    }

    // 3) Invalid config should fail validation
    let bad_toml = toml_content.replace("3m", "10m");
    fs::write(&path, bad_toml).expect("write bad toml");
    let err = load_config(path_str).expect_err("lifetime above 5 minutes must fail");
    assert!(err.contains("assertion_lifetime"), "unexpected error: {err}");

    // 4) Malformed cron is rejected
    let bad_cron = toml_content.replace("30 6 * * 1-5", "0 0 * * ");
    fs::write(&path, bad_cron).expect("write bad cron");
    let err = load_config(path_str).expect_err("malformed cron must fail");
    assert!(err.contains("schedule.cron"), "unexpected error: {err}");

    // 5) Serving the JWKS needs no export or email settings
    let minimal = "[auth]\njwks_path = \"keys.json\"\n";
    fs::write(&path, minimal).expect("write minimal");
    let cfg = load_unvalidated(path_str).expect("minimal config loads");
    assert!(cfg.validate_serving().is_ok());
    assert!(cfg.validate().is_err());

    // 6) An explicit path must exist
    let missing = dir.path().join("missing.toml");
    assert!(load_config(missing.to_str()).is_err());
}
