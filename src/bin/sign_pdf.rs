//! Sign a PDF with a local key.
//!
//! Stands in for an HSM during development: the key is loaded into a
//! [`LocalKeystore`] and used through the same external-signer path.
//!
//! Usage:
//!   cargo run --bin sign_pdf -- <input.pdf> <output.pdf> <key.der> <signer.der> [issuer.der ...]
//!       [--certify 1|2|3] [--reason TEXT] [--location TEXT] [--reserve BYTES]
//!       [--config signing.json] [--pades]

use pdf_extsign::signatures::{
    DocMdpPermission, ExternalSigner, LocalKeystore, PdfSigner, SignOptions, SignatureSubFilter,
};
use pdf_extsign::{PdfDocument, SigningConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const KEY_ALIAS: &str = "signer";

struct SignArgs {
    input: PathBuf,
    output: PathBuf,
    key: PathBuf,
    certificates: Vec<PathBuf>,
    certify: Option<u8>,
    reason: Option<String>,
    location: Option<String>,
    reserve: Option<usize>,
    config: Option<PathBuf>,
    pades: bool,
}

impl SignArgs {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut positional = Vec::new();
        let mut certify = None;
        let mut reason = None;
        let mut location = None;
        let mut reserve = None;
        let mut config = None;
        let mut pades = false;

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut value = || take_value(&args, &mut i);
            match flag {
                "--certify" => {
                    let level = value()?;
                    certify = Some(level.parse().map_err(|_| format!("bad level: {}", level))?);
                },
                "--reason" => reason = Some(value()?),
                "--location" => location = Some(value()?),
                "--reserve" => {
                    let bytes = value()?;
                    reserve = Some(bytes.parse().map_err(|_| format!("bad size: {}", bytes))?);
                },
                "--config" => config = Some(PathBuf::from(value()?)),
                "--pades" => pades = true,
                other => positional.push(PathBuf::from(other)),
            }
            i += 1;
        }

        if positional.len() < 4 {
            return Err(
                "usage: sign_pdf <input.pdf> <output.pdf> <key.der> <signer.der> [issuer.der ...]".to_string(),
            );
        }
        let mut positional = positional.into_iter();
        let (Some(input), Some(output), Some(key)) = (positional.next(), positional.next(), positional.next())
        else {
            return Err("missing arguments".to_string());
        };

        Ok(Self {
            input,
            output,
            key,
            certificates: positional.collect(),
            certify,
            reason,
            location,
            reserve,
            config,
            pades,
        })
    }
}

fn take_value(args: &[String], i: &mut usize) -> Result<String, String> {
    *i += 1;
    args.get(*i).cloned().ok_or_else(|| format!("{} needs a value", args[*i - 1]))
}

fn load_keystore(args: &SignArgs) -> Result<(LocalKeystore, Vec<String>), Box<dyn std::error::Error>> {
    let mut keystore = LocalKeystore::new();

    let key = std::fs::read(&args.key)?;
    if keystore.add_pkcs8_key(KEY_ALIAS, &key).is_err() {
        keystore.add_pkcs1_key(KEY_ALIAS, &key)?;
    }

    let mut aliases = Vec::with_capacity(args.certificates.len());
    for (i, path) in args.certificates.iter().enumerate() {
        let alias = if i == 0 {
            KEY_ALIAS.to_string()
        } else {
            format!("issuer-{}", i)
        };
        keystore.add_certificate(alias.clone(), std::fs::read(path)?);
        aliases.push(alias);
    }
    Ok((keystore, aliases))
}

fn run(args: &SignArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (keystore, aliases) = load_keystore(args)?;
    let keystore: Arc<dyn ExternalSigner> = Arc::new(keystore);

    let mut config = match &args.config {
        Some(path) => SigningConfig::from_file(path)?,
        None => SigningConfig::new(),
    };
    config.key_alias = KEY_ALIAS.to_string();
    config.certificate_aliases = aliases;
    if let Some(reserve) = args.reserve {
        config.reservation = reserve;
    }

    let mut options = SignOptions::default().with_estimated_size(config.reservation);
    if let Some(level) = args.certify {
        options = options.with_certification(DocMdpPermission::from_level(level)?);
    }
    if let Some(reason) = &args.reason {
        options = options.with_reason(reason.clone());
    }
    if let Some(location) = &args.location {
        options = options.with_location(location.clone());
    }
    if args.pades {
        options = options.with_sub_filter(SignatureSubFilter::CadesDetached);
    }

    let signer = PdfSigner::from_config(keystore, &config)?.with_options(options);
    let mut document = PdfDocument::open(&args.input)?;
    let signed = signer.sign(&mut document)?;
    std::fs::write(&args.output, &signed)?;

    println!("Signed {} -> {} ({} bytes)", args.input.display(), args.output.display(), signed.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match SignArgs::from_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        },
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
