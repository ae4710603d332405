use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cannot read script: {0}")]
    Script(#[from] std::io::Error),
    #[error("server answered {status}: {message}")]
    Rejected { status: StatusCode, message: String },
}

pub type Result<T> = result::Result<T, CliError>;

pub struct ClientCli {
    inner: Client,
    base_url: String,
}

impl ClientCli {
    pub fn connect(server: &str) -> Result<Self> {
        Ok(Self {
            inner: Client::builder().build()?,
            base_url: server.trim_end_matches('/').to_string(),
        })
    }

    /// Submit a script. Prints its stdout, stderr and result; a script that
    /// failed or timed out comes back as `Rejected`.
    pub async fn execute(&self, script: &str) -> Result<()> {
        let response = self
            .inner
            .post(format!("{}/execute", self.base_url))
            .json(&json!({ "script": script }))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if let Some(stdout) = body.get("stdout").and_then(Value::as_str) {
            print!("{}", stdout);
        }
        if let Some(stderr) = body.get("stderr").and_then(Value::as_str) {
            eprint!("{}", stderr);
        }
        if body.get("truncated").and_then(Value::as_bool) == Some(true) {
            eprintln!("(output truncated)");
        }
        if let Some(message) = body.get("error").and_then(Value::as_str) {
            return Err(CliError::Rejected {
                status,
                message: message.to_string(),
            });
        }
        match body.get("result") {
            Some(result) => {
                let pretty = serde_json::to_string_pretty(result)
                    .unwrap_or_else(|_| result.to_string());
                println!("{}", pretty);
                Ok(())
            }
            None => Err(CliError::Rejected {
                status,
                message: "response carried no result".to_string(),
            }),
        }
    }

    pub async fn health(&self) -> Result<()> {
        let response = self
            .inner
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(CliError::Rejected {
                status,
                message: body.to_string(),
            });
        }
        println!("{}", body);
        Ok(())
    }
}
