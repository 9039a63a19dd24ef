use crate::infra::{parse_fa_assignment, LocalDispatcher};
use clap::Args;
use fc_forms::config::AppConfig;
use fc_forms::error::AppError;
use fc_forms::workflows::dispatch::{
    job_id_from_key, FormRepository, InMemoryFormRepository, InMemoryJobDirectory,
    LocalObjectStore, ObjectCreatedEvent, StoredForm,
};
use fc_forms::workflows::estimate::{render, EstimateFormBuilder, FormContext, RenderedForm};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ProcessArgs {
    /// Inference output file (JSON)
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Object key the output was stored under; defaults to the input path
    #[arg(long)]
    pub(crate) source_key: Option<String>,
    /// Financial assistance number to print on the form
    #[arg(long)]
    pub(crate) fa_number: Option<String>,
    /// Assistant surgeon fee supplied by the caller
    #[arg(long)]
    pub(crate) assistant_surgeon_fee: Option<Decimal>,
    /// Emit single-line JSON instead of pretty output
    #[arg(long)]
    pub(crate) compact: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DispatchArgs {
    /// Object-created notification file (JSON)
    #[arg(long)]
    pub(crate) event: PathBuf,
    /// Override the configured object store root
    #[arg(long)]
    pub(crate) object_root: Option<PathBuf>,
    /// Register a financial assistance number, as JOB_ID=FA_NUMBER (repeatable)
    #[arg(long = "fa-number", value_parser = parse_fa_assignment)]
    pub(crate) fa_numbers: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct DispatchReport<'a> {
    stored: &'a [String],
    duplicates: &'a [String],
    skipped: &'a [String],
    forms: Vec<StoredForm>,
}

pub(crate) fn run_process(args: ProcessArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let compact = args.compact;
    let form = process_file(args, &config.dispatch.output_suffix)?;
    write_json(&form, compact)
}

pub(crate) fn process_file(args: ProcessArgs, output_suffix: &str) -> Result<RenderedForm, AppError> {
    let ProcessArgs {
        input,
        source_key,
        fa_number,
        assistant_surgeon_fee,
        ..
    } = args;

    let source_key = source_key.unwrap_or_else(|| input.display().to_string());
    let context = FormContext::new(job_id_from_key(&source_key, output_suffix), source_key)
        .with_fa_number(fa_number)
        .with_assistant_surgeon_fee(assistant_surgeon_fee.unwrap_or(Decimal::ZERO));

    let record = EstimateFormBuilder::from_path(&input, &context)?;
    Ok(render(&record))
}

pub(crate) fn run_dispatch(args: DispatchArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(root) = args.object_root {
        config.dispatch.object_root = root;
    }

    let directory = InMemoryJobDirectory::default();
    for (job_id, fa_number) in args.fa_numbers {
        directory
            .register(job_id, fa_number)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
    }

    let bytes = std::fs::read(&args.event)?;
    let event = ObjectCreatedEvent::from_slice(&bytes).map_err(std::io::Error::from)?;

    let dispatcher: LocalDispatcher = LocalDispatcher::new(
        Arc::new(LocalObjectStore::new(config.dispatch.object_root.clone())),
        Arc::new(directory),
        Arc::new(InMemoryFormRepository::default()),
        &config.dispatch,
    );

    let (summary, failure) = match dispatcher.handle(&event) {
        Ok(summary) => (summary, None),
        Err(err) => (err.summary.clone(), Some(err)),
    };

    let repository = dispatcher.repository();
    let mut forms = Vec::with_capacity(summary.stored.len());
    for job_id in &summary.stored {
        let stored = repository
            .fetch(job_id)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
        if let Some(form) = stored {
            forms.push(form);
        }
    }

    write_json(
        &DispatchReport {
            stored: &summary.stored,
            duplicates: &summary.duplicates,
            skipped: &summary.skipped,
            forms,
        },
        false,
    )?;

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn write_json<T: Serialize>(value: &T, compact: bool) -> Result<(), AppError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if compact {
        serde_json::to_writer(&mut handle, value).map_err(std::io::Error::from)?;
    } else {
        serde_json::to_writer_pretty(&mut handle, value).map_err(std::io::Error::from)?;
    }
    writeln!(handle)?;
    Ok(())
}
