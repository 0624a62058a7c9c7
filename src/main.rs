use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pedersen_vss::protocol::{truncate_digits, DealerVerdict, IntegrityVerdict, Tamper};
use pedersen_vss::{Config, Disclosure, Error};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pedersen-committed Shamir secret sharing", long_about = None)]
struct Cli {
    /// Directory holding `shares/`, `commitments/` and `generator.json`.
    #[arg(long, env = "PVSS_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Whether commitment records keep the share values `y` and `r`.
    #[arg(long, env = "PVSS_DISCLOSURE", default_value_t = Disclosure::Auditable, global = true)]
    disclosure: Disclosure,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a secret into n shares, any k of which reconstruct it.
    Split {
        #[arg(long, conflicts_with = "secret_file", required_unless_present = "secret_file")]
        secret: Option<String>,
        /// Read the secret bytes from a file instead.
        #[arg(long)]
        secret_file: Option<PathBuf>,
        #[arg(short = 'n', long = "shares")]
        n: u32,
        #[arg(short = 'k', long = "threshold")]
        k: u32,
    },
    /// Issue the commitment for one share.
    Commit { index: u32 },
    /// Issue commitments for every stored share.
    CommitAll,
    /// Check one share against its issued commitment.
    VerifyShare { index: u32 },
    /// Check that all issued shares lie on a single polynomial pair.
    VerifyDealer { k: usize },
    /// Recover the secret from the listed shares.
    Reconstruct {
        #[arg(required = true, num_args = 1..)]
        indices: Vec<u32>,
    },
}

/// 命令执行结果：协议层的否定结论不是程序错误
enum Outcome {
    Passed,
    Rejected,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();

    match run(cli) {
        Ok(Outcome::Passed) => ExitCode::SUCCESS,
        Ok(Outcome::Rejected) => ExitCode::from(1),
        Err(err) => {
            println!("[ERROR] {err:#}");
            exit_code(&err)
        }
    }
}

/// 0 成功, 1 协议失败, 2 资源失败 (文件系统 / JSON 不可用)
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<Error>() {
        Some(e) if !e.is_resource_failure() => ExitCode::from(1),
        _ => ExitCode::from(2),
    }
}

fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let config = Config::new(&cli.data_dir, cli.disclosure);
    let deployment = config
        .open()
        .with_context(|| format!("opening deployment in {}", config.data_dir.display()))?;
    println!(
        "[INFO] data dir: {}, disclosure: {}, H fingerprint: {}",
        config.data_dir.display(),
        config.disclosure,
        deployment.group().fingerprint()
    );

    match cli.command {
        Command::Split {
            secret,
            secret_file,
            n,
            k,
        } => {
            let secret = match (secret, secret_file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => fs::read(&path)
                    .with_context(|| format!("reading secret from {}", path.display()))?,
                (None, None) => anyhow::bail!("either --secret or --secret-file is required"),
            };
            let dealing = deployment.generate_all_shares(&secret, n, k)?;
            println!("[split] 秘密已拆分为 {n} 个分片，门限 k = {k}");
            for share in &dealing.shares {
                println!(
                    "      share {:02}: y = {}",
                    share.x,
                    truncate_digits(&share.y.to_string())
                );
            }
            println!(
                "      [OK] 系数承诺已公开 ({} 项)",
                dealing.polynomial.coefficients.len()
            );
            Ok(Outcome::Passed)
        }

        Command::Commit { index } => {
            let record = deployment.generate_commitment(index)?;
            println!(
                "[commit] share {:02}: C = {}",
                index,
                truncate_digits(&record.commitment.to_string())
            );
            Ok(Outcome::Passed)
        }

        Command::CommitAll => {
            let records = deployment.generate_all_commitments()?;
            for record in &records {
                println!(
                    "[commit] share {:02}: C = {}",
                    record.share,
                    truncate_digits(&record.commitment.to_string())
                );
            }
            println!("      [OK] {} 个承诺", records.len());
            Ok(Outcome::Passed)
        }

        Command::VerifyShare { index } => match deployment.verify_share(index)? {
            IntegrityVerdict::Valid => {
                println!("[verify-share] share {index:02}: Valid");
                Ok(Outcome::Passed)
            }
            IntegrityVerdict::Tampered(tamper) => {
                println!("[verify-share] share {index:02}: Tampered");
                match tamper {
                    Tamper::Commitment {
                        recorded,
                        recomputed,
                    } => {
                        println!("      recorded   C = {}", truncate_digits(&recorded.to_string()));
                        println!("      recomputed C = {}", truncate_digits(&recomputed.to_string()));
                    }
                    Tamper::Coordinate { recorded, current } => {
                        println!("      x changed: {recorded} -> {current}");
                    }
                }
                Ok(Outcome::Rejected)
            }
        },

        Command::VerifyDealer { k } => {
            let report = deployment.verify_dealer(k)?;
            println!("[verify-dealer] checked {} shares, k = {k}", report.checked);
            if !report.base.is_empty() {
                println!("      base set: {:?}", report.base);
            }
            if !report.integrity_failures.is_empty() {
                println!(
                    "      [WARN] shares failing their own commitment: {:?}",
                    report.integrity_failures
                );
            }
            if !report.techniques_agree() {
                println!(
                    "      [WARN] direct check {:?} vs homomorphic check {:?}",
                    report.direct, report.homomorphic
                );
            }
            match report.verdict {
                DealerVerdict::Honest => {
                    println!("      Honest");
                    Ok(Outcome::Passed)
                }
                DealerVerdict::Malicious(indices) => {
                    println!("      Malicious({indices:?})");
                    Ok(Outcome::Rejected)
                }
            }
        }

        Command::Reconstruct { indices } => {
            let secret = deployment.reconstruct_secret(&indices)?;
            println!("[reconstruct] shares {indices:?}");
            match String::from_utf8(secret) {
                Ok(text) => println!("{text}"),
                Err(e) => println!("0x{}", hex::encode(e.into_bytes())),
            }
            Ok(Outcome::Passed)
        }
    }
}
