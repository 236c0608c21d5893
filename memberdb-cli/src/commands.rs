use anyhow::{Context, Result};
use log::info;
use memberdb::{
    config::Config,
    merkletree::{verify, ProofPath},
    utils::parse_hash32,
    Registry,
};
use serde_json::{json, Value};

use crate::cli::{Command, RegistryCli};

pub fn init_logging(max_level: &str) {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(max_level));
}

fn open_registry(args: &RegistryCli) -> Result<Registry> {
    let config = Config::new(&args.db_dir, false, !args.no_sync);
    info!("opening registry under {}", args.db_dir);
    Registry::open(&config).with_context(|| format!("cannot open registry at {}", args.db_dir))
}

/// Runs one command and returns its JSON result.
pub fn run(args: &RegistryCli) -> Result<Value> {
    let registry = || open_registry(args);
    let out = match &args.command {
        Command::Register { owner, commitment } => {
            serde_json::to_value(registry()?.register(owner, commitment)?)?
        }
        Command::Lookup { owner } => serde_json::to_value(registry()?.lookup(owner)?)?,
        Command::Root { version: None } => serde_json::to_value(registry()?.latest_root())?,
        Command::Root {
            version: Some(version),
        } => serde_json::to_value(registry()?.root_at(*version)?)?,
        Command::History => {
            let roots = registry()?
                .history()
                .iter()
                .collect::<memberdb::Result<Vec<_>>>()?;
            serde_json::to_value(roots)?
        }
        Command::Prove {
            commitment: Some(commitment),
            ..
        } => serde_json::to_value(registry()?.prove(commitment)?)?,
        Command::Prove {
            owner: Some(owner),
            ..
        } => serde_json::to_value(registry()?.prove_owner(owner)?)?,
        Command::Prove { .. } => anyhow::bail!("prove needs --commitment or --owner"),
        Command::Verify { leaf, root, proof } => verify_offline(leaf, root, proof)?,
        Command::RecordVerification {
            owner,
            transaction_ref,
            amount,
            payer_address,
        } => serde_json::to_value(registry()?.record_verification(
            owner,
            transaction_ref,
            amount,
            payer_address,
        )?)?,
        Command::Status { owner } => {
            serde_json::to_value(registry()?.verification_status(owner)?)?
        }
        Command::Rebuild => serde_json::to_value(registry()?.rebuild()?)?,
    };
    Ok(out)
}

fn verify_offline(leaf: &str, root: &str, proof: &str) -> Result<Value> {
    let leaf = parse_hash32(leaf).context("bad --leaf")?;
    let root = parse_hash32(root).context("bad --root")?;
    let proof: ProofPath = serde_json::from_str(proof).context("bad --proof")?;
    Ok(json!({ "valid": verify(&leaf, &proof, &root) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn hex_of(byte: u8) -> String {
        format!("0x{}", "0".repeat(62) + &format!("{:02x}", byte))
    }

    fn run_args(dir: &str, rest: &[&str]) -> Result<Value> {
        let mut argv = vec!["memberdb", "--db-dir", dir, "--no-sync"];
        argv.extend_from_slice(rest);
        run(&RegistryCli::try_parse_from(argv)?)
    }

    #[test]
    fn test_register_prove_verify() {
        let dir = tempfile::Builder::new()
            .prefix("memberdb-cli")
            .tempdir()
            .unwrap();
        let dir = dir.path().to_str().unwrap();
        let a = hex_of(0xaa);
        let b = hex_of(0xbb);

        run_args(dir, &["register", "--owner", "A", "--commitment", &a]).unwrap();
        let reg = run_args(dir, &["register", "--owner", "B", "--commitment", &b]).unwrap();
        assert_eq!(reg["root"]["leaf_count"], 2);

        let proof = run_args(dir, &["prove", "--owner", "A"]).unwrap();
        assert_eq!(proof["commitment"], a);
        let root = proof["root"].as_str().unwrap().to_owned();
        let path = proof["proof"].to_string();

        let valid = run_args(dir, &["verify", "--leaf", &a, "--root", &root, "--proof", &path]).unwrap();
        assert_eq!(valid, json!({ "valid": true }));
        let invalid = run_args(dir, &["verify", "--leaf", &b, "--root", &root, "--proof", &path]).unwrap();
        assert_eq!(invalid, json!({ "valid": false }));

        let history = run_args(dir, &["history"]).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 2);
        let latest = run_args(dir, &["root"]).unwrap();
        assert_eq!(latest["root"], root);
    }

    #[test]
    fn test_conflicts_are_errors() {
        let dir = tempfile::Builder::new()
            .prefix("memberdb-cli")
            .tempdir()
            .unwrap();
        let dir = dir.path().to_str().unwrap();
        run_args(dir, &["register", "--owner", "A", "--commitment", &hex_of(1)]).unwrap();
        let err = run_args(dir, &["register", "--owner", "A", "--commitment", &hex_of(2)]).unwrap_err();
        assert!(err.to_string().contains("already"));

        let status = run_args(dir, &["status", "--owner", "A"]).unwrap();
        assert_eq!(status["status"], "unverified");
        run_args(
            dir,
            &[
                "record-verification",
                "--owner",
                "A",
                "--transaction-ref",
                "tx1",
                "--amount",
                "0.01",
                "--payer-address",
                "wallet1",
            ],
        )
        .unwrap();
        let status = run_args(dir, &["status", "--owner", "A"]).unwrap();
        assert_eq!(status["status"], "verified");
    }

    #[test]
    fn test_prove_needs_a_target() {
        assert!(RegistryCli::try_parse_from(["memberdb", "prove"]).is_err());
    }
}
