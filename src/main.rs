use clap::Parser;
use esm4_store::{ContentLoader, ContentStore, FormId, LoadOutcome, LoaderOptions};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "esm4-inspect", about = "Load ESM4 content files and query the merged records")]
struct Cli {
    /// Content files in load order (masters first)
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Read temporary cell children while loading instead of deferring them
    #[arg(long)]
    inline: bool,
    /// Materialize a cell by FormId (hex) after loading
    #[arg(long, value_name = "FORMID")]
    materialize: Option<FormId>,
    /// Show a cell by editor id
    #[arg(long, value_name = "EDITOR_ID")]
    cell: Option<String>,
    /// Show the cell at a world grid slot; WORLD is a FormId or editor id
    #[arg(long, num_args = 3, value_names = ["WORLD", "X", "Y"], allow_hyphen_values = true)]
    grid: Vec<String>,
}

fn resolve(store: &ContentStore, text: &str) -> Option<FormId> {
    text.parse::<FormId>()
        .ok()
        .filter(|id| store.find(*id).is_some())
        .or_else(|| store.lookup_alias(text))
}

fn print_cell(store: &ContentStore, id: FormId) {
    let Some(cell) = store.cell(id) else {
        println!("  Cell {} not found", id);
        return;
    };
    println!("  Cell {} '{}'", cell.form_id, cell.editor_id);
    if let Some(name) = &cell.full_name {
        println!("    Name: {}", name);
    }
    match cell.grid {
        Some(grid) if !cell.is_interior() => println!("    Grid: {}", grid),
        _ => println!("    Interior"),
    }
    if let Some(world) = cell.world {
        println!("    World: {}", world);
    }
    println!("    Phase: {:?}", store.cell_phase(id));
    println!("    Leaf: {}", store.is_leaf(id).unwrap_or(true));
    if let Some(contents) = store.cell_contents(id) {
        println!(
            "    References: {} persistent, {} temporary, {} visible when distant",
            contents.persistent.len(),
            contents.temporary.len(),
            contents.visible_distant.len()
        );
        for reference in contents.iter().take(10) {
            if let Some(r) = store.reference(reference) {
                match store.portal_destination(reference) {
                    Some(dest) => println!("      {} base {} -> cell {}", r.form_id, r.base, dest),
                    None => println!("      {} base {}", r.form_id, r.base),
                }
            }
        }
        if contents.len() > 10 {
            println!("      ... and {} more", contents.len() - 10);
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let options = LoaderOptions::default().with_deferred_cell_children(!cli.inline);
    let mut loader = ContentLoader::new(options);

    println!("Loading {} content files", cli.files.len());
    println!("{}", "=".repeat(60));

    match loader.load_files(&cli.files) {
        Ok(LoadOutcome::Completed) => {}
        Ok(LoadOutcome::Cancelled { files_loaded }) => {
            println!("Load cancelled after {} files", files_loaded);
        }
        Err(e) => {
            eprintln!("\nERROR: Failed to load content files");
            eprintln!("  {}", e);
            process::exit(1);
        }
    }

    println!("\nFiles:");
    for source in loader.sources() {
        println!(
            "  [{:02X}] {} (version {}, {} masters{})",
            source.index,
            source.name,
            source.header.version,
            source.header.masters.len(),
            if source.header.is_master() { ", master" } else { "" }
        );
    }

    println!("\nStatistics:");
    for (kind, count) in loader.store().counts() {
        println!("  {}: {}", kind, count);
    }
    println!("  Portals: {}", loader.store().cross_references().portals().count());

    if let Some(id) = cli.materialize {
        match loader.materialize(id) {
            Ok(merged) => println!("\nMaterialized cell {}: {} records merged", id, merged),
            Err(e) => {
                eprintln!("\nERROR: Failed to materialize cell {}", id);
                eprintln!("  {}", e);
                process::exit(1);
            }
        }
    }

    if let Some(editor_id) = &cli.cell {
        println!("\nCell '{}':", editor_id);
        match loader.store().lookup_alias(editor_id) {
            Some(id) => print_cell(loader.store(), id),
            None => println!("  No record with editor id '{}'", editor_id),
        }
    }

    if let [world, x, y] = cli.grid.as_slice() {
        let store = loader.store();
        let (Ok(x), Ok(y)) = (x.parse::<i32>(), y.parse::<i32>()) else {
            eprintln!("ERROR: grid coordinates must be integers");
            process::exit(1);
        };
        println!("\nGrid ({}, {}) of world '{}':", x, y, world);
        match resolve(store, world).and_then(|w| store.cell_at(w, x, y)) {
            Some(id) => print_cell(store, id),
            None => println!("  No cell registered"),
        }
    }

    let diagnostics = loader.diagnostics();
    if !diagnostics.is_empty() {
        println!("\nDiagnostics ({}):", diagnostics.len());
        for diagnostic in diagnostics.iter().take(20) {
            println!("  {}", diagnostic);
        }
        if diagnostics.len() > 20 {
            println!("  ... and {} more", diagnostics.len() - 20);
        }
    }
}
