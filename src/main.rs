use std::io::{self, Read, Write};

use clap::Parser;

use zettelstore::app::{App, AppError, MetaView, ZettelView};
use zettelstore::cli::{Cli, Commands};
use zettelstore::config::Config;
use zettelstore::logging;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_stdin() -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;
    Ok(buf)
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if !cli.boxes.is_empty() {
        config.boxes = Config::with_boxes(&cli.boxes).boxes;
    }
    if cli.read_only {
        config.read_only_mode = true;
    }
    logging::init(&config.log_level);

    let input = match &cli.command {
        Commands::Create | Commands::Update(_) => read_stdin()?,
        _ => Vec::new(),
    };
    let app = App::open(&config)?;

    match cli.command {
        Commands::Get(args) => {
            let zettel = app.get_zettel(args.zid)?;
            if cli.json {
                print_json(&ZettelView::from(&zettel))?;
            } else {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&zettel.meta.write_zettel(zettel.content.as_bytes()))?;
                writeln!(stdout)?;
            }
        }
        Commands::Meta(args) => {
            let meta = app.get_meta(args.zid)?;
            if cli.json {
                print_json(&MetaView::from(&meta))?;
            } else {
                for (key, value) in meta.computed_pairs() {
                    println!("{}: {}", key, value);
                }
            }
        }
        Commands::Query(args) => {
            let outcome = app.query(&args.query.join(" "))?;
            if cli.json {
                print_json(&outcome)?;
            } else if let Some(arrangement) = &outcome.arrangement {
                for group in &arrangement.groups {
                    println!("{} {}", group.count, group.name);
                }
            } else {
                for view in &outcome.zettel {
                    let title = view.meta.get("title").map(String::as_str).unwrap_or("");
                    println!("{} {}", view.id, title);
                }
            }
        }
        Commands::Create => {
            let zid = app.create_zettel(&input)?;
            if cli.json {
                print_json(&serde_json::json!({ "id": zid }))?;
            } else {
                println!("created {}", zid);
            }
        }
        Commands::Update(args) => {
            app.update_zettel(args.zid, &input)?;
            println!("updated {}", args.zid);
        }
        Commands::Delete(args) => {
            app.delete_zettel(args.zid)?;
            println!("deleted {}", args.zid);
        }
        Commands::Rename(args) => {
            app.rename_zettel(args.cur, args.new)?;
            println!("renamed {} -> {}", args.cur, args.new);
        }
        Commands::Stats => {
            let stats = app.stats();
            if cli.json {
                print_json(&stats)?;
            } else {
                println!(
                    concat!(
                        "boxes={} zettel={} read_only={} indexed={} words={} urls={} ",
                        "updates={} last_reload={} since_reload={} reload_ms={}"
                    ),
                    stats.num_managed_boxes,
                    stats.zettel_total,
                    stats.read_only,
                    stats.zettel_indexed,
                    stats.indexed_words,
                    stats.indexed_urls,
                    stats.index_updates,
                    stats.last_reload.as_deref().unwrap_or("never"),
                    stats.indexes_since_reload,
                    stats.dur_last_reload_ms
                );
            }
        }
        Commands::Dump => print!("{}", app.dump()),
        Commands::Refresh => {
            app.refresh()?;
            println!("refreshed {}", app.manager().location());
        }
    }
    Ok(())
}
