#!/usr/bin/env cargo
//! PCRD Database Seeder
//!
//! A terminal application for seeding the PCRD API with realistic laboratory
//! test-request data. It creates requests with testing samples, then walks a
//! portion of them through the sample lifecycle (receive, operation complete,
//! results approval) so the resulting dataset covers every request status.
//!
//! Usage:
//!   `cargo run --bin seed_database -- --url http://localhost:3000 --token YOUR_JWT_TOKEN`

use anyhow::{Result, anyhow};
use clap::{Arg, Command};
use console::style;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rand::seq::IndexedRandom;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::time::{Duration, sleep};

#[derive(Debug, Clone)]
pub struct SeedingConfig {
    pub base_url: String,
    pub jwt_token: String,
    pub client: Client,
}

#[derive(Debug, Default)]
pub struct CreatedObjects {
    pub requests: Vec<Value>,
    pub received_requests: Vec<Value>,
    pub completed_requests: Vec<Value>,
    pub rejected_requests: Vec<Value>,
}

pub struct DatabaseSeeder {
    config: SeedingConfig,
    created_objects: CreatedObjects,
}

const MATERIALS: &[&str] = &[
    "Epoxy resin batch",
    "Polycarbonate sheet",
    "Anodized aluminium panel",
    "Rubber gasket compound",
    "Powder coating sample",
    "PVC extrusion profile",
    "Stainless fastener lot",
    "Adhesive film roll",
];

const TEST_METHODS: &[&str] = &[
    "tensile",
    "hardness",
    "adhesion",
    "salt-spray",
    "thermal-cycling",
    "impact",
];

const REQUESTERS: &[&str] = &["j.doe", "m.garcia", "a.chen", "k.mueller", "s.okafor"];

fn random_sample_seeds() -> Vec<Value> {
    let mut rng = rand::rng();
    let seed_count = rng.random_range(1..=3);

    (0..seed_count)
        .map(|_| {
            let method_count = rng.random_range(1..=3);
            let mut methods: Vec<&str> = TEST_METHODS
                .choose_multiple(&mut rng, method_count)
                .copied()
                .collect();
            methods.sort_unstable();

            json!({
                "name": *MATERIALS.choose(&mut rng).unwrap(),
                "test_methods": methods,
                "repeats": rng.random_range(1..=3),
                "priority": if rng.random_bool(0.2) { "urgent" } else { "normal" },
            })
        })
        .collect()
}

impl DatabaseSeeder {
    pub fn new(base_url: String, jwt_token: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        Self {
            config: SeedingConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                jwt_token,
                client,
            },
            created_objects: CreatedObjects::default(),
        }
    }

    async fn make_request(
        &self,
        method: &str,
        endpoint: &str,
        data: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        let response = match method.to_uppercase().as_str() {
            "GET" => {
                self.config
                    .client
                    .get(&url)
                    .header("authorization", format!("Bearer {}", self.config.jwt_token))
                    .send()
                    .await?
            }
            "POST" => {
                let mut request = self
                    .config
                    .client
                    .post(&url)
                    .header("authorization", format!("Bearer {}", self.config.jwt_token))
                    .header("content-type", "application/json");
                if let Some(json_data) = data {
                    request = request.json(&json_data);
                }
                request.send().await?
            }
            _ => return Err(anyhow!("Unsupported HTTP method")),
        };

        if response.status().is_success() {
            let result = response.json::<Value>().await?;
            Ok(result)
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!("HTTP {status} {endpoint}: {error_text}"))
        }
    }

    pub async fn create_requests(&mut self) -> Result<()> {
        println!(
            "{} Creating test requests with samples...",
            style("[1/4]").bold().dim()
        );

        let mut rng = rand::rng();
        let request_count = 16;

        let pb = ProgressBar::new(request_count);
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}")
            .unwrap()
            .progress_chars("##-"));

        for i in 0..request_count {
            let request_type = ["ntr", "ntr", "asr", "er"].choose(&mut rng).unwrap();
            let material = MATERIALS.choose(&mut rng).unwrap();
            let request_data = json!({
                "request_type": request_type,
                "title": format!("{material} qualification #{:02}", i + 1),
                "requested_by": *REQUESTERS.choose(&mut rng).unwrap(),
                "sample_seeds": random_sample_seeds(),
            });

            pb.set_message(format!("Creating: {material}"));

            let result = self
                .make_request("POST", "/api/requests", Some(request_data))
                .await?;
            self.created_objects.requests.push(result);

            pb.inc(1);
            sleep(Duration::from_millis(50)).await;
        }

        pb.finish_with_message("Requests created!");
        println!(
            "{} Created {} requests",
            style("OK").green(),
            self.created_objects.requests.len()
        );

        Ok(())
    }

    /// Receive the samples of roughly three quarters of the created requests
    /// through the batch endpoint, in parallel chunks.
    pub async fn receive_samples(&mut self) -> Result<()> {
        println!("{} Receiving samples...", style("[2/4]").bold().dim());

        let to_receive: Vec<Value> = self
            .created_objects
            .requests
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 4 != 3)
            .map(|(_, r)| r.clone())
            .collect();

        let pb = ProgressBar::new(to_receive.len() as u64);
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}")
            .unwrap()
            .progress_chars("##-"));

        let this: &Self = self;
        let tasks = to_receive.iter().map(|request| {
            let id = request["id"].as_str().unwrap().to_string();
            let pb = pb.clone();
            async move {
                let result = this
                    .make_request(
                        "POST",
                        &format!("/api/requests/{id}/receive"),
                        Some(json!({"receive_all": true, "changed_by": "seed-tool"})),
                    )
                    .await;
                pb.inc(1);
                result
            }
        });

        for result in join_all(tasks).await {
            match result {
                Ok(_) => {}
                Err(e) => println!("{} Receive failed: {e}", style("WARN").yellow()),
            }
        }
        self.created_objects.received_requests = to_receive;

        pb.finish_with_message("Samples received!");
        println!(
            "{} Received samples for {} requests",
            style("OK").green(),
            self.created_objects.received_requests.len()
        );

        Ok(())
    }

    /// Push half of the received requests through operation completion and
    /// results approval so they end up `Completed`.
    pub async fn complete_operations(&mut self) -> Result<()> {
        println!(
            "{} Completing operations and approving results...",
            style("[3/4]").bold().dim()
        );

        let to_complete: Vec<Value> = self
            .created_objects
            .received_requests
            .iter()
            .step_by(2)
            .cloned()
            .collect();
        let ids: Vec<&str> = to_complete
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();

        if ids.is_empty() {
            return Ok(());
        }

        for action in ["complete", "approve"] {
            let result = self
                .make_request(
                    "POST",
                    "/api/requests/batch",
                    Some(json!({
                        "ids": ids,
                        "action": action,
                        "changed_by": "seed-tool",
                    })),
                )
                .await?;
            println!(
                "   {} batch {action}: {} samples updated",
                style(">").cyan(),
                style(result["total_updated"].as_u64().unwrap_or(0))
                    .bold()
                    .green()
            );
        }

        self.created_objects.completed_requests = to_complete;
        println!(
            "{} Completed {} requests",
            style("OK").green(),
            self.created_objects.completed_requests.len()
        );

        Ok(())
    }

    /// Reject a couple of untouched requests so the terminal override states
    /// show up in the dataset too.
    pub async fn reject_requests(&mut self) -> Result<()> {
        println!("{} Rejecting a few requests...", style("[4/4]").bold().dim());

        let untouched: Vec<Value> = self
            .created_objects
            .requests
            .iter()
            .filter(|r| {
                !self
                    .created_objects
                    .received_requests
                    .iter()
                    .any(|received| received["id"] == r["id"])
            })
            .take(2)
            .cloned()
            .collect();

        for request in &untouched {
            let id = request["id"].as_str().unwrap();
            self.make_request(
                "POST",
                &format!("/api/requests/{id}/reject"),
                Some(json!({"changed_by": "seed-tool"})),
            )
            .await?;
        }

        self.created_objects.rejected_requests = untouched;
        println!(
            "{} Rejected {} requests",
            style("OK").green(),
            self.created_objects.rejected_requests.len()
        );

        Ok(())
    }

    pub async fn seed_database(&mut self) -> Result<()> {
        println!();
        println!("{}", style("PCRD Database Seeder").bold().blue());
        println!(
            "{}",
            style("Creating realistic laboratory test-request data...").dim()
        );
        println!();

        self.create_requests().await?;
        self.receive_samples().await?;
        self.complete_operations().await?;
        self.reject_requests().await?;

        self.display_summary();

        Ok(())
    }

    fn display_summary(&self) {
        println!();
        println!("{}", style("Database Seeding Complete!").bold().green());
        println!("{}", style("=".repeat(50)).dim());

        let summary_data = vec![
            ("Requests", self.created_objects.requests.len()),
            (
                "Received",
                self.created_objects.received_requests.len(),
            ),
            (
                "Completed",
                self.created_objects.completed_requests.len(),
            ),
            ("Rejected", self.created_objects.rejected_requests.len()),
        ];

        for (name, count) in summary_data {
            if count > 0 {
                println!(
                    "{:.<20} {}",
                    style(name).cyan(),
                    style(count).bold().green()
                );
            }
        }

        println!();
        println!("{} Next Steps:", style(">").cyan());
        println!("  {} Open the portal to browse the requests", style("-").dim());
        println!(
            "  {} Check the notification feed for the status changes",
            style("-").dim()
        );
        println!(
            "  {} Use this data for API testing and development",
            style("-").dim()
        );
        println!();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("PCRD Database Seeder")
        .version("1.0")
        .about("Seeds the PCRD API with realistic test-request data")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("API base URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new("token")
                .short('t')
                .long("token")
                .value_name("JWT_TOKEN")
                .help("JWT authentication token")
                .required(true),
        )
        .get_matches();

    let base_url = matches.get_one::<String>("url").unwrap().clone();
    let jwt_token = matches.get_one::<String>("token").unwrap().clone();

    println!("{}", style("PCRD Database Seeder v1.0").bold());
    println!("{}", style("-".repeat(40)).dim());
    println!("API URL: {}", style(&base_url).cyan());
    println!(
        "Token:   {}...{}",
        style("*".repeat(8)).dim(),
        style(&jwt_token[jwt_token.len().saturating_sub(8)..]).dim()
    );

    let mut seeder = DatabaseSeeder::new(base_url, jwt_token);
    seeder.seed_database().await?;

    Ok(())
}
