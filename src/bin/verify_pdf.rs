//! Verify the signatures of a PDF.
//!
//! Usage:
//!   cargo run --bin verify_pdf -- <file.pdf>

use pdf_extsign::signatures::{DocMdpManager, SignatureVerifier};
use pdf_extsign::PdfDocument;
use std::process::ExitCode;

fn run(path: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let document = PdfDocument::open(path)?;
    let data = document.original_bytes();
    let verifier = SignatureVerifier::new();

    println!("DocMDP: {}", DocMdpManager::read_permission(&document)?);

    let signatures = document.signature_dictionaries()?;
    if signatures.is_empty() {
        println!("No signatures");
        return Ok(true);
    }

    let mut all_valid = true;
    for (i, sig) in signatures.iter().enumerate() {
        let result = verifier.verify(data, sig)?;
        let info = &result.signature_info;
        println!(
            "#{} {:?} subject={} covers_whole_document={}",
            i + 1,
            result.status,
            info.certificate_subject.as_deref().unwrap_or("?"),
            info.covers_whole_document
        );
        if let Some(level) = info.certification_level {
            println!("   certification: {}", level);
        }
        for message in &result.messages {
            println!("   {}", message);
        }
        all_valid &= result.status.is_ok();
    }
    Ok(all_valid)
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: verify_pdf <file.pdf>");
        return ExitCode::from(2);
    };

    match run(&path) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
