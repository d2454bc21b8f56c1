use clap::{Parser, Subcommand};
use papershard::{assemble, DecodeOutcome, EncodeParams, Reassembler};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Exit code when only part of the archive could be reconstructed.
const EXIT_PARTIAL: i32 = 2;
/// Exit code when nothing trustworthy could be produced.
const EXIT_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "papershard", about = "Erasure-coded framing for printable optical-code backups")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a file into self-describing frames, one per optical symbol
    Encode {
        input: PathBuf,
        /// Directory receiving one .psf file per frame
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Bytes of file data per frame
        #[arg(long, default_value = "512")]
        payload_size: u16,
        /// Data shards per redundancy group (k)
        #[arg(long, default_value = "10")]
        data_shards: u16,
        /// Parity shards per redundancy group (m); any m frames of a group may be lost
        #[arg(long, default_value = "4")]
        parity_shards: u16,
    },
    /// Reassemble a file from a directory of scanned frames, in any order
    Decode {
        input_dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Print the decode report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Report archive metadata and per-group shard availability without decoding
    Info {
        input_dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {

        // ── Encode ───────────────────────────────────────────────────────────
        Commands::Encode { input, output_dir, payload_size, data_shards, parity_shards } => {
            let data = std::fs::read(&input)?;
            let params = EncodeParams { payload_size, data_shards, parity_shards };
            let (descriptor, frames) = assemble(&data, &params)?;

            std::fs::create_dir_all(&output_dir)?;
            for (seq, frame) in frames.iter().enumerate() {
                let path = output_dir.join(format!("frame-{seq:05}.psf"));
                std::fs::write(path, frame)?;
            }

            println!("Archive   {}", descriptor.digest_hex());
            println!("  id          {:016x}", descriptor.archive_id());
            println!("  file bytes  {}", descriptor.file_length);
            println!("  blocks      {} x {} B", descriptor.total_blocks, descriptor.payload_size);
            println!("  groups      {} ({}+{} shards each)",
                     descriptor.group_count(), descriptor.data_shards, descriptor.parity_shards);
            println!("  frames      {} -> {}", frames.len(), output_dir.display());
        }

        // ── Decode ───────────────────────────────────────────────────────────
        Commands::Decode { input_dir, output, json } => {
            let mut reassembler = Reassembler::new();
            reassembler.ingest_all(&read_frame_dir(&input_dir)?);

            match reassembler.finish() {
                DecodeOutcome::Recovered { data, report } => {
                    std::fs::write(&output, &data)?;
                    if json {
                        println!("{}", json!({
                            "status": "recovered",
                            "bytes": data.len(),
                            "report": report,
                        }));
                    } else {
                        println!("Recovered: {} bytes -> {}", data.len(), output.display());
                        println!("  {}", report.summary());
                    }
                }
                DecodeOutcome::PartiallyRecovered { recovered_ranges, report } => {
                    if json {
                        let ranges: Vec<[u64; 2]> =
                            recovered_ranges.iter().map(|r| [r.start, r.end]).collect();
                        println!("{}", json!({
                            "status": "partially_recovered",
                            "recovered_ranges": ranges,
                            "report": report,
                        }));
                    } else {
                        eprintln!("Partially recovered; no output written.");
                        eprintln!("  {}", report.summary());
                        eprintln!("  unrecoverable groups: {:?}", report.unrecoverable_groups);
                        for range in &recovered_ranges {
                            eprintln!("  recovered bytes {}..{}", range.start, range.end);
                        }
                    }
                    std::process::exit(EXIT_PARTIAL);
                }
                DecodeOutcome::Failed { reason, report } => {
                    if json {
                        println!("{}", json!({
                            "status": "failed",
                            "reason": reason.to_string(),
                            "report": report,
                        }));
                    } else {
                        eprintln!("Failed: {reason}");
                        eprintln!("  {}", report.summary());
                    }
                    std::process::exit(EXIT_FAILED);
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input_dir, json } => {
            let mut reassembler = Reassembler::new();
            reassembler.ingest_all(&read_frame_dir(&input_dir)?);

            let descriptor = match reassembler.descriptor() {
                Some(d) => d.clone(),
                None => {
                    eprintln!("No descriptor frame found in {}", input_dir.display());
                    std::process::exit(EXIT_FAILED);
                }
            };

            let total = descriptor.data_shards + descriptor.parity_shards;
            let need = descriptor.data_shards as usize;
            let present: Vec<usize> = (0..descriptor.group_count())
                .map(|g| {
                    reassembler
                        .pool()
                        .present_in_group(descriptor.archive_id(), g, total)
                })
                .collect();
            let short_groups = present.iter().filter(|&&p| p < need).count();

            if json {
                let groups: Vec<serde_json::Value> = present
                    .iter()
                    .enumerate()
                    .map(|(g, &p)| json!({
                        "group": g,
                        "present": p,
                        "total": total,
                        "recoverable": p >= need,
                    }))
                    .collect();
                println!("{}", json!({
                    "digest": descriptor.digest_hex(),
                    "archive_id": format!("{:016x}", descriptor.archive_id()),
                    "file_length": descriptor.file_length,
                    "payload_size": descriptor.payload_size,
                    "data_shards": descriptor.data_shards,
                    "parity_shards": descriptor.parity_shards,
                    "total_blocks": descriptor.total_blocks,
                    "groups": groups,
                }));
            } else {
                println!("── papershard archive ──────────────────────────────────");
                println!("  Digest        {}", descriptor.digest_hex());
                println!("  Archive id    {:016x}", descriptor.archive_id());
                println!("  File length   {} B", descriptor.file_length);
                println!("  Payload size  {} B", descriptor.payload_size);
                println!("  Shards/group  {} data + {} parity",
                         descriptor.data_shards, descriptor.parity_shards);
                println!("  Blocks        {}", descriptor.total_blocks);
                println!("  Groups        {}", descriptor.group_count());
                for (g, &p) in present.iter().enumerate() {
                    let verdict = if p >= need { "ok" } else { "SHORT" };
                    println!("  group {g:>6}  {p:>3}/{total} shards  {verdict}");
                }
            }

            if short_groups > 0 {
                eprintln!("{short_groups} group(s) below the recovery threshold");
                std::process::exit(EXIT_PARTIAL);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Read every regular file in `dir` as one candidate frame, in whatever
/// order the filesystem yields them.
fn read_frame_dir(dir: &Path) -> std::io::Result<Vec<Vec<u8>>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            frames.push(std::fs::read(entry.path())?);
        }
    }
    Ok(frames)
}
