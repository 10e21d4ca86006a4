use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use quill_anchor::{LedgerAnchor, RpcLedger};
use quill_crypto::{CanonicalHasher, PayerKeypair};
use quill_sdk::{
    CreateRequest, CreateResponse, DocumentService, SignRequest, SignResponse, VerifyRequest,
};
use quill_server::{DynDocumentService, QuillServer};
use quill_store::{BlobStore, FsBlobStore, SqliteVersionStore, VersionStore};
use quill_types::{DocumentId, OwnerId};
use serde::Serialize;

use crate::cli::*;
use crate::config::QuillConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        config: config_path,
        format,
        ..
    } = cli;

    match command {
        Command::Hash(args) => cmd_hash(args, &format),
        Command::InitConfig(args) => cmd_init_config(args, &config_path),
        Command::Keygen(args) => cmd_keygen(args),
        command => {
            let config = QuillConfig::load_or_default(&config_path)?;
            let service = open_service(&config)?;
            match command {
                Command::Create(args) => cmd_create(&service, args, &format).await,
                Command::Sign(args) => cmd_sign(&service, args, &format).await,
                Command::Verify(args) => cmd_verify(&service, args, &format).await,
                Command::Show(args) => cmd_show(&service, args, &format).await,
                Command::History(args) => cmd_history(&service, args, &format).await,
                Command::Reject(args) => cmd_reject(&service, args).await,
                Command::Serve(args) => cmd_serve(config, service, args).await,
                Command::Hash(_) | Command::InitConfig(_) | Command::Keygen(_) => Ok(()),
            }
        }
    }
}

/// Wire the configured ledger, database and blob directory into a service.
fn open_service(config: &QuillConfig) -> anyhow::Result<DynDocumentService> {
    if let Some(parent) = config.store.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let ledger: Arc<dyn LedgerAnchor> =
        Arc::new(RpcLedger::from_config(config.ledger.clone()).context("configuring ledger client")?);
    let store: Arc<dyn VersionStore> = Arc::new(
        SqliteVersionStore::open(&config.store.database_path)
            .with_context(|| format!("opening {}", config.store.database_path.display()))?,
    );
    let blobs: Arc<dyn BlobStore> = Arc::new(
        FsBlobStore::open(config.store.blob_dir.clone())
            .with_context(|| format!("opening {}", config.store.blob_dir.display()))?,
    );
    Ok(DocumentService::new(ledger, store, blobs, config.service.clone()))
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn owner(args: &OwnerArgs) -> anyhow::Result<OwnerId> {
    OwnerId::new(args.owner.as_str()).context("invalid --owner")
}

fn document_id(raw: &str) -> anyhow::Result<DocumentId> {
    raw.parse().with_context(|| format!("invalid document id {raw:?}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_hash(args: HashArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let content = read_file(&args.file)?;
    let secret = args.password.unwrap_or_default();
    let hash = CanonicalHasher::CONTENT.hash(&content, args.marker, &secret);
    match format {
        OutputFormat::Json => print_json(&hash),
        OutputFormat::Text => {
            println!("{}  {}", hash.to_hex().yellow(), args.file.display());
            println!("  marker: {}", hash.freshness_marker);
            Ok(())
        }
    }
}

fn print_created(service: &DynDocumentService, created: &CreateResponse) {
    println!("{} Document created", "✓".green().bold());
    println!("  Id:          {}", created.id.to_string().cyan());
    println!("  Version:     {}", created.version);
    println!("  Hash:        {}", created.unsigned_hash.yellow());
    println!("  Marker:      {}", created.freshness_marker);
    println!("  Transaction: {}", created.tx_signature);
    println!("  Explorer:    {}", service.transaction_url(&created.tx_signature).blue());
}

fn print_signed(service: &DynDocumentService, signed: &SignResponse) {
    println!("{} Document signed", "✓".green().bold());
    println!("  Version:     {}", signed.version);
    println!("  Status:      {}", signed.status.to_string().green());
    println!("  Hash:        {}", signed.signed_hash.yellow());
    println!("  Marker:      {}", signed.freshness_marker);
    println!("  Transaction: {}", signed.tx_signature);
    println!("  Explorer:    {}", service.transaction_url(&signed.tx_signature).blue());
}

async fn cmd_create(service: &DynDocumentService, args: CreateArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let owner = owner(&args.owner)?;
    let original = read_file(&args.file)?;
    let unsigned = match &args.unsigned {
        Some(path) => read_file(path)?,
        None => original.clone(),
    };
    let filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut request = CreateRequest::new(args.name, filename, args.mime_type)
        .with_documents(original, unsigned);
    request.password = args.password;
    request.required_signatures = args.required;

    match &args.sign_with {
        Some(path) => {
            let signed = read_file(path)?;
            let result = service.create_and_sign_immediately(&owner, request, signed).await?;
            match format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Text => {
                    print_created(service, &result.created);
                    print_signed(service, &result.signed);
                }
            }
        }
        None => {
            let created = service.create(&owner, request).await?;
            match format {
                OutputFormat::Json => print_json(&created)?,
                OutputFormat::Text => print_created(service, &created),
            }
        }
    }
    Ok(())
}

async fn cmd_sign(service: &DynDocumentService, args: SignArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let signer = owner(&args.owner)?;
    let mut request = SignRequest::new(document_id(&args.document)?, read_file(&args.file)?);
    request.password = args.password;
    let signed = service.sign(&signer, request).await?;
    match format {
        OutputFormat::Json => print_json(&signed),
        OutputFormat::Text => {
            print_signed(service, &signed);
            Ok(())
        }
    }
}

async fn cmd_verify(service: &DynDocumentService, args: VerifyArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let mut request = VerifyRequest::new(args.tx_signature, read_file(&args.file)?, args.marker);
    request.password = args.password;
    let result = service.verify(request).await?;
    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text if result.matches => {
            println!("{} {} matches the anchored hash", "✓".green().bold(), args.file.display());
            println!("  Hash: {}", result.anchored_hash.yellow());
        }
        OutputFormat::Text => {
            println!("{} {} does not match the anchored hash", "✗".red().bold(), args.file.display());
            println!("  Anchored: {}", result.anchored_hash.yellow());
            println!("  Computed: {}", result.computed_hash.red());
        }
    }
    if !result.matches {
        bail!("verification failed");
    }
    Ok(())
}

async fn cmd_show(service: &DynDocumentService, args: ShowArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let view = service
        .document(&owner(&args.owner)?, &document_id(&args.document)?)
        .await?;
    if let OutputFormat::Json = format {
        return print_json(&view);
    }
    let doc = &view.document;
    println!("{} {}", doc.name.bold(), doc.id.to_string().dimmed());
    println!("  Owner:     {}", doc.owner);
    println!("  Status:    {}", doc.status.to_string().green());
    println!("  File:      {} ({})", doc.original_filename, doc.mime_type);
    println!("  Signed:    requires {}", doc.required_signatures);
    println!("  Password:  {}", if doc.is_password_protected() { "yes" } else { "no" });
    println!(
        "  Current:   {} {} {}",
        view.current.number,
        view.current.stage.as_str(),
        view.current.hash.to_hex().yellow()
    );
    if let Some(tx) = view.current.tx_signature() {
        println!("  Explorer:  {}", service.transaction_url(tx).blue());
    }
    Ok(())
}

async fn cmd_history(service: &DynDocumentService, args: ShowArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let report = service
        .history(&owner(&args.owner)?, &document_id(&args.document)?)
        .await?;
    if let OutputFormat::Json = format {
        return print_json(&report);
    }
    println!("{} ({})", report.document.name.bold(), report.document.status);
    for version in &report.versions {
        println!(
            "  {:>4}  {:<8}  {}  {}  {}",
            version.number.to_string().yellow(),
            version.stage.as_str(),
            version.hash.to_hex().dimmed(),
            version.created_by,
            version.tx_signature().unwrap_or("(not anchored)"),
        );
    }
    if report.intact {
        println!(
            "{} {} versions, {} anchored",
            "✓".green().bold(),
            report.versions.len(),
            report.anchored
        );
    } else {
        println!(
            "{} history audit failed: {}",
            "✗".red().bold(),
            report.problem.as_deref().unwrap_or("unknown problem")
        );
    }
    Ok(())
}

async fn cmd_reject(service: &DynDocumentService, args: ShowArgs) -> anyhow::Result<()> {
    let id = document_id(&args.document)?;
    let status = service.reject(&owner(&args.owner)?, &id).await?;
    println!("{} Document {} is now {}", "✓".green().bold(), id, status.to_string().red());
    Ok(())
}

async fn cmd_serve(config: QuillConfig, service: DynDocumentService, args: ServeArgs) -> anyhow::Result<()> {
    let mut server_config = config.server;
    if let Some(bind) = args.bind {
        server_config.bind_addr = bind.parse().with_context(|| format!("invalid --bind {bind:?}"))?;
    }
    println!("Quill server on {}", server_config.bind_addr.to_string().bold());
    QuillServer::new(server_config, service).serve().await?;
    Ok(())
}

fn cmd_keygen(args: KeygenArgs) -> anyhow::Result<()> {
    if args.path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", args.path.display());
    }
    let keypair = PayerKeypair::generate();
    keypair
        .save(&args.path)
        .with_context(|| format!("writing {}", args.path.display()))?;
    println!("{} Wrote payer keypair to {}", "✓".green().bold(), args.path.display());
    println!("  Address: {}", keypair.address().cyan());
    println!("  Fund this address, then set ledger.keypair_path in quill.toml.");
    Ok(())
}

fn cmd_init_config(args: InitConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    let path = args.path.as_deref().unwrap_or(config_path);
    write_default_config(path, args.force)?;
    println!("{} Wrote {}", "✓".green().bold(), path.display());
    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let text = QuillConfig::default().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
