use s3grant::config::ProbeConfig;
use s3grant::path::PathSpec;
use s3grant::policy;
use s3grant::region::Region;
use s3grant::report::{ARTIFACT_FILE, ArtifactWriter, CredentialsContext};
use s3grant::{CheckRequest, CreateRequest, Provisioner};
use s3grant_aws::{IamIdentity, S3Storage};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Render the bucket access policy for the customer to attach.
    Create,
    /// Verify the grant and write the cluster artifact.
    Check,
}

#[derive(Debug, Parser)]
#[command(name = "s3grant")]
#[command(about = "Verifies read-only S3 access grants for a managed cluster", long_about = None)]
struct Opt {
    #[arg(long, value_enum)]
    action: Action,

    /// Bucket and optional prefix, e.g. `acme-data/raw/`
    #[arg(long)]
    s3_bucket: String,

    /// Region the cluster runs in
    #[arg(long)]
    region: Region,

    #[arg(long)]
    customername: String,

    /// Cluster AWS account id, required for `create`
    #[arg(long)]
    interana_account_id: Option<String>,

    /// Identity whose policies are checked
    #[arg(long)]
    identity: Option<String>,

    #[arg(long, requires = "aws_secret_key")]
    aws_access_key: Option<String>,

    #[arg(long, requires = "aws_access_key")]
    aws_secret_key: Option<String>,

    /// Write an unvalidated artifact before probing starts
    #[arg(long)]
    force: bool,

    /// JSON file with probe settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Policy template overriding the built-in one
    #[arg(long)]
    template: Option<PathBuf>,

    #[arg(long, default_value = policy::POLICY_FILE)]
    policy_file: PathBuf,

    #[arg(long, default_value = ARTIFACT_FILE)]
    output: PathBuf,
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(io::stderr)
        .init();
}

fn load_config(opt: &Opt) -> Result<ProbeConfig> {
    let mut config = match &opt.config {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            ProbeConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ProbeConfig::default(),
    };
    if let Some(identity) = &opt.identity {
        config.identity_name.clone_from(identity);
    }
    Ok(config)
}

fn credentials(opt: &Opt) -> CredentialsContext {
    CredentialsContext {
        access_key: opt.aws_access_key.clone(),
        secret_key: opt.aws_secret_key.clone(),
    }
}

async fn sdk_config(opt: &Opt) -> aws_config::SdkConfig {
    let mut loader = aws_config::from_env().region(aws_config::Region::new(opt.region.as_str().to_owned()));

    if let (Some(ak), Some(sk)) = (&opt.aws_access_key, &opt.aws_secret_key) {
        let cred = Credentials::new(ak.clone(), sk.clone(), None, None, "s3grant");
        loader = loader.credentials_provider(SharedCredentialsProvider::new(cred));
    }

    loader.load().await
}

async fn create(opt: &Opt, provisioner: &Provisioner<'_>) -> Result<()> {
    let Some(account_id) = &opt.interana_account_id else {
        bail!("--interana-account-id is required for --action create");
    };

    let template = match &opt.template {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading template {}", path.display()))?,
        None => policy::DEFAULT_TEMPLATE.to_owned(),
    };

    let req = CreateRequest {
        s3_bucket: opt.s3_bucket.clone(),
        account_id: account_id.clone(),
        template,
    };
    let outcome = provisioner.create(&req).await?;

    policy::save(&opt.policy_file, &outcome.policy)
        .with_context(|| format!("writing {}", opt.policy_file.display()))?;

    let mut stdout = io::stdout().lock();
    writeln!(
        stdout,
        "****{} contents. Please attach this policy to your bucket****",
        opt.policy_file.display()
    )?;
    writeln!(stdout, "{}", serde_json::to_string_pretty(&outcome.policy)?)?;

    info!(path = %opt.policy_file.display(), warnings = outcome.warnings.len(), "wrote bucket policy");
    Ok(())
}

fn read_policy(path: &Path) -> Option<serde_json::Value> {
    match policy::load(path) {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!(path = %path.display(), "cannot read bucket policy: {err}");
            None
        }
    }
}

async fn check(opt: &Opt, provisioner: &Provisioner<'_>) -> Result<()> {
    let req = CheckRequest {
        s3_bucket: opt.s3_bucket.clone(),
        region: opt.region.clone(),
        cluster_name: opt.customername.clone(),
        force: opt.force,
        policy_document: read_policy(&opt.policy_file),
    };

    let mut sink = ArtifactWriter::new(&opt.output, credentials(opt), io::stdout());
    let report = provisioner.check(&req, &mut sink).await?;

    if report.validated() {
        info!("read-only access confirmed");
    } else {
        warn!(warnings = report.warnings().len(), "read-only access not confirmed, see the artifact warnings");
    }
    Ok(())
}

async fn run(opt: &Opt) -> Result<()> {
    // reject malformed paths before touching the network
    let config = load_config(opt)?;
    let path = PathSpec::parse(&opt.s3_bucket, &config.delimiter)?;
    info!(%path, action = ?opt.action, region = %opt.region, "starting");

    let sdk_conf = sdk_config(opt).await;
    let storage = S3Storage::new(aws_sdk_s3::Client::new(&sdk_conf));
    let identity = IamIdentity::new(aws_sdk_iam::Client::new(&sdk_conf));
    let provisioner = Provisioner::new(&storage, &identity, &config);

    match opt.action {
        Action::Create => create(opt, &provisioner).await,
        Action::Check => check(opt, &provisioner).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let opt = Opt::parse();
    let result = run(&opt).await;
    if let Err(err) = &result {
        error!("{err:#}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Opt, clap::Error> {
        Opt::try_parse_from(std::iter::once("s3grant").chain(args.iter().copied()))
    }

    const BASE: &[&str] = &["--s3-bucket", "acme-data/raw/", "--region", "us-west-2", "--customername", "acme"];

    #[test]
    fn command_is_well_formed() {
        Opt::command().debug_assert();
    }

    #[test]
    fn check_defaults() {
        let mut args = vec!["--action", "check"];
        args.extend_from_slice(BASE);
        let opt = parse(&args).unwrap();

        assert_eq!(opt.action, Action::Check);
        assert_eq!(opt.region.as_str(), "us-west-2");
        assert_eq!(opt.output, PathBuf::from("interana_cluster.json"));
        assert_eq!(opt.policy_file, PathBuf::from("s3_bucket_list.policy"));
        assert!(!opt.force);
        assert!(opt.aws_access_key.is_none());
    }

    #[test]
    fn keys_come_in_pairs() {
        let mut args = vec!["--action", "check", "--aws-access-key", "AKEXAMPLE"];
        args.extend_from_slice(BASE);
        assert!(parse(&args).is_err());

        args.extend_from_slice(&["--aws-secret-key", "SKEXAMPLE"]);
        let opt = parse(&args).unwrap();
        let creds = credentials(&opt);
        assert_eq!(creds.access_key.as_deref(), Some("AKEXAMPLE"));
        assert_eq!(creds.secret_key.as_deref(), Some("SKEXAMPLE"));
    }

    #[test]
    fn rejects_bad_region_and_action() {
        let args = [
            "--action", "check", "--s3-bucket", "b", "--region", "US_EAST", "--customername", "acme",
        ];
        assert!(parse(&args).is_err());

        let mut args = vec!["--action", "delete"];
        args.extend_from_slice(BASE);
        assert!(parse(&args).is_err());
    }

    #[test]
    fn identity_flag_overrides_config() {
        let mut args = vec!["--action", "create", "--identity", "ops_admin"];
        args.extend_from_slice(BASE);
        let opt = parse(&args).unwrap();
        let config = load_config(&opt).unwrap();
        assert_eq!(config.identity_name, "ops_admin");
        assert_eq!(config.delimiter, "/");
    }

    #[test]
    fn missing_policy_file_is_not_fatal() {
        let missing = Path::new(env!("CARGO_MANIFEST_DIR")).join("no-such.policy");
        assert!(read_policy(&missing).is_none());
    }
}
