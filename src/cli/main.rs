use anyhow::{anyhow, bail, Context};
use cardio_risk_ai::config::{ArtifactsConfig, InferenceConfig};
use cardio_risk_ai::ml::{ModelArtifacts, PredictorService};
use cardio_risk_ai::models::{find_sample, sample_patients, PatientRecord};
use clap::{Args, Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use std::path::PathBuf;
use validator::Validate;

#[derive(Parser)]
#[command(name = "cardio-cli")]
#[command(about = "Cardio Risk AI command line client", version, long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        env = "CARDIO_AI_ENDPOINT",
        default_value = "http://localhost:8000"
    )]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

/// Patient input: a named sample or JSON file, then per-field overrides
#[derive(Args, Debug, Default)]
struct PatientArgs {
    /// Start from a built-in sample patient (see `samples`)
    #[arg(long, conflicts_with = "file")]
    sample: Option<String>,

    /// Start from a JSON patient record
    #[arg(short, long)]
    file: Option<PathBuf>,

    #[arg(long)]
    age: Option<u32>,
    #[arg(long)]
    sex: Option<u8>,
    #[arg(long)]
    cp: Option<u8>,
    #[arg(long)]
    trestbps: Option<u32>,
    #[arg(long)]
    chol: Option<u32>,
    #[arg(long)]
    fbs: Option<u8>,
    #[arg(long)]
    restecg: Option<u8>,
    #[arg(long)]
    thalach: Option<u32>,
    #[arg(long)]
    exang: Option<u8>,
    #[arg(long)]
    oldpeak: Option<f64>,
    #[arg(long)]
    slope: Option<u8>,
    #[arg(long)]
    ca: Option<u8>,
    #[arg(long)]
    thal: Option<u8>,
}

impl PatientArgs {
    fn resolve(&self) -> anyhow::Result<PatientRecord> {
        let mut patient = if let Some(name) = &self.sample {
            find_sample(name)
                .map(|s| s.patient)
                .ok_or_else(|| anyhow!("unknown sample '{}'", name))?
        } else if let Some(path) = &self.file {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing patient record {}", path.display()))?
        } else {
            PatientRecord::default()
        };

        macro_rules! overrides {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field {
                    patient.$field = v;
                })*
            };
        }
        overrides!(
            age, sex, cp, trestbps, chol, fbs, restecg, thalach, exang, oldpeak, slope, ca, thal
        );

        patient.validate().context("invalid patient record")?;
        Ok(patient)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Predict heart disease risk
    Predict {
        #[command(flatten)]
        patient: PatientArgs,
    },

    /// Explain a prediction with SHAP values
    Explain {
        #[command(flatten)]
        patient: PatientArgs,
    },

    /// Compare a patient with the reference cohort
    Compare {
        #[command(flatten)]
        patient: PatientArgs,
    },

    /// List built-in sample patients
    Samples {
        /// Print raw JSON records
        #[arg(long)]
        json: bool,
    },

    /// Show model metadata and evaluation metrics
    Info,

    /// Score a patient locally from an artifact directory, without a server
    Score {
        #[command(flatten)]
        patient: PatientArgs,

        /// Directory holding the model artifacts
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Include SHAP values
        #[arg(long)]
        explain: bool,
    },
}

/// One-line clinical description of a patient
fn describe_patient(p: &PatientRecord) -> String {
    format!(
        "{} y/o {}, {}, BP {} mmHg, chol {} mg/dl, max HR {}, ST depression {:.1}, {} slope, {} vessels, thal {}, ECG {}",
        p.age,
        p.sex_label().to_lowercase(),
        p.chest_pain_label().to_lowercase(),
        p.trestbps,
        p.chol,
        p.thalach,
        p.oldpeak,
        p.slope_label().to_lowercase(),
        p.ca,
        p.thal_label().to_lowercase(),
        p.restecg_label().to_lowercase(),
    )
}

async fn send(request: RequestBuilder) -> anyhow::Result<serde_json::Value> {
    let response = request.send().await.context("request failed")?;
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("response was not JSON")?;
    if !status.is_success() {
        let message = body["error"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        bail!("server returned {}: {}", status, message);
    }
    Ok(body)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Health => {
            let body = send(client.get(format!("{}/health", cli.endpoint))).await?;
            print_json(&body)?;
        }

        Commands::Predict { patient } => {
            let patient = patient.resolve()?;
            let body = send(
                client
                    .post(format!("{}/predict", cli.endpoint))
                    .json(&patient),
            )
            .await?;
            print_json(&body)?;
        }

        Commands::Explain { patient } => {
            let patient = patient.resolve()?;
            let body = send(client.post(format!("{}/shap", cli.endpoint)).json(&patient)).await?;
            print_json(&body)?;
        }

        Commands::Compare { patient } => {
            let patient = patient.resolve()?;
            let body = send(
                client
                    .post(format!("{}/cohort/compare", cli.endpoint))
                    .json(&patient),
            )
            .await?;
            print_json(&body)?;
        }

        Commands::Samples { json } => {
            if json {
                print_json(&sample_patients())?;
            } else {
                for sample in sample_patients() {
                    println!("{}: {}", sample.name, sample.description);
                    println!("  {}", describe_patient(&sample.patient));
                }
            }
        }

        Commands::Info => {
            let body = send(client.get(format!("{}/model/info", cli.endpoint))).await?;
            print_json(&body)?;
        }

        Commands::Score {
            patient,
            artifacts,
            explain,
        } => {
            let patient = patient.resolve()?;
            let config = ArtifactsConfig::in_dir(artifacts);
            let bundle = ModelArtifacts::load(&config)
                .with_context(|| format!("loading artifacts from {}", config.dir.display()))?;

            let service = PredictorService::new(config, InferenceConfig::default());
            service.install(bundle).await;

            if explain {
                print_json(&service.explain(&patient).await?)?;
            } else {
                print_json(&service.predict(&patient).await?)?;
            }
        }
    }

    Ok(())
}
