//! mixcase CLI - recommend a cocktail from a case library.
//!
//! Thin glue around the CBR core: load the library, read a constraints
//! file, print the adapted recipe, and (for genuine adaptations) ask for a
//! 0-10 rating to feed the learning step.
//!
//! Run with: cargo run -- Data/case_library.json -c constraints.json

use anyhow::{bail, Context, Result};
use clap::Parser;
use mixcase::{CbrEngine, CaseLibrary, Constraints, Recommendation, SimilarityWeights};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mixcase", version, about = "Case-based cocktail recommendation")]
struct Args {
    /// Path to the JSON case library
    library: PathBuf,

    /// Path to a JSON constraints file ({"constraints": {...}})
    #[arg(short, long)]
    constraints: PathBuf,

    /// Optional JSON file overriding the similarity weight table
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Seed for the random source, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Retry budget for the retrieve-adapt-guard cycle
    #[arg(long, default_value_t = mixcase::DEFAULT_RETRY_BUDGET)]
    retries: usize,

    /// Minimum rating for an adaptation to count as a success
    #[arg(long, default_value_t = mixcase::DEFAULT_SUCCESS_THRESHOLD)]
    threshold: f64,

    /// Skip the interactive evaluation prompt
    #[arg(long)]
    no_eval: bool,
}

/// Envelope of the constraints file, matching the original data format.
#[derive(Deserialize)]
struct ConstraintsFile {
    constraints: Constraints,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixcase=info".into()),
        )
        .init();

    let args = Args::parse();

    let library = CaseLibrary::load(&args.library)
        .with_context(|| format!("failed to load case library from {:?}", args.library))?;

    let mut engine = match args.seed {
        Some(seed) => CbrEngine::with_seed(library, seed),
        None => CbrEngine::new(library),
    };
    engine.set_retry_budget(args.retries);
    engine.set_success_threshold(args.threshold);

    if let Some(path) = &args.weights {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read weights from {:?}", path))?;
        let weights: SimilarityWeights = serde_json::from_str(&raw)?;
        engine.set_weights(weights);
    }

    let constraints = load_constraints(&args.constraints)?;

    let rec = engine.recommend(&constraints)?;
    print_recommendation(&rec);

    let unmet = constraints.violations(&rec.adapted);
    if !unmet.is_empty() {
        println!("\nConstraints not fully met:");
        for v in &unmet {
            println!("  - {}", v);
        }
    }

    if rec.is_original() {
        println!("\nThe library already had a recipe satisfying every constraint.");
        return Ok(());
    }

    if !args.no_eval {
        let score = ask_score()?;
        let parent_utility = engine.evaluate(&rec, score)?;
        println!(
            "Thanks! '{}' recorded; '{}' utility is now {:.2}.",
            rec.adapted.name, rec.retrieved.name, parent_utility
        );
    }

    Ok(())
}

fn load_constraints(path: &PathBuf) -> Result<Constraints> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read constraints from {:?}", path))?;
    let file: ConstraintsFile =
        serde_json::from_str(&raw).context("constraints file must be {\"constraints\": {...}}")?;
    let c = file.constraints;

    let no_constraint = c.category.is_empty()
        && c.glass_type.is_empty()
        && c.ingredients.is_empty()
        && c.alc_type.is_empty()
        && c.basic_taste.is_empty()
        && c.exc_ingredients.is_empty()
        && c.exc_alc_type.is_empty()
        && c.exc_basic_taste.is_empty();
    if no_constraint {
        bail!("no constraints specified, please add some");
    }
    Ok(c)
}

fn print_recommendation(rec: &Recommendation) {
    println!("Retrieved case: {}", rec.retrieved.name);
    println!(
        "Adapted cocktail: {} ({} edits)",
        rec.adapted.name, rec.edit_count
    );
    println!("Glass: {}", rec.adapted.glass_type);
    println!("\nIngredients:");
    for line in rec.adapted.render_ingredients() {
        println!("  {}", line);
    }
    println!("\nPreparation:");
    for step in rec.adapted.render_preparation() {
        println!("  {}", step);
    }
}

fn ask_score() -> Result<f64> {
    let stdin = io::stdin();
    loop {
        print!("\nHow good was the cocktail? Score between 0 and 10: ");
        io::stdout().flush()?;
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        match line.trim().parse::<f64>() {
            Ok(score) if (0.0..=10.0).contains(&score) => return Ok(score),
            _ => println!("Not a valid score, try again."),
        }
    }
}
