use interaction_finder::DATA_SOURCES;
use interaction_finder::cancel::CancelToken;
use interaction_finder::id_mapper::{
    BridgeRestConfig, BridgeRestMapper, IdMapper, MapperStack, MappingTable,
};
use interaction_finder::pathway::{PathwayDoc, read_pathway_input};
use interaction_finder::presenter::ConsolePresenter;
use interaction_finder::resolver::{ReferenceIndex, resolve_search_identifier};
use interaction_finder::rhea::{RheaClient, RheaConfig};
use interaction_finder::search::SearchSession;
use std::env;

fn usage() {
    eprintln!(
        "Usage:\n  \
  ifind --version\n  \
  ifind [OPTIONS] interactions\n  \
  ifind [OPTIONS] resolve EDGE_ID\n  \
  ifind [OPTIONS] search EDGE_ID\n\n\
Options:\n  \
  --pathway PATH   GPML pathway file or http(s) URL (required)\n  \
  --mappings PATH  identifier mapping table, JSON\n  \
  --bridge         also map identifiers through the BridgeDb web service\n  \
  --endpoint URL   reaction search endpoint base, up to and including 'q='\n  \
  --pick N         pick candidate N without prompting\n  \
  --yes            answer one-sided confirmations with yes\n  \
  --verbose        debug logging on stderr"
    );
}

#[derive(Default)]
struct Options {
    pathway: Option<String>,
    mappings: Option<String>,
    use_bridge: bool,
    endpoint: Option<String>,
    pick: Option<usize>,
    assume_yes: bool,
    verbose: bool,
}

fn take_value(args: &[String], index: &mut usize, flag: &str) -> Result<String, String> {
    *index += 1;
    args.get(*index)
        .cloned()
        .ok_or_else(|| format!("Missing value for {flag}"))
}

fn parse_options(args: &[String]) -> Result<(Options, Vec<String>), String> {
    let mut options = Options::default();
    let mut rest = vec![];
    let mut index = 1;
    while index < args.len() {
        match args[index].as_str() {
            "--pathway" => options.pathway = Some(take_value(args, &mut index, "--pathway")?),
            "--mappings" => options.mappings = Some(take_value(args, &mut index, "--mappings")?),
            "--bridge" => options.use_bridge = true,
            "--endpoint" => options.endpoint = Some(take_value(args, &mut index, "--endpoint")?),
            "--pick" => {
                let raw = take_value(args, &mut index, "--pick")?;
                let pick = raw
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --pick value '{raw}'"))?;
                options.pick = Some(pick);
            }
            "--yes" => options.assume_yes = true,
            "--verbose" => options.verbose = true,
            other if other.starts_with("--") => return Err(format!("Unknown option '{other}'")),
            other => rest.push(other.to_string()),
        }
        index += 1;
    }
    Ok((options, rest))
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_pathway(options: &Options) -> Result<PathwayDoc, String> {
    let source = options
        .pathway
        .as_deref()
        .ok_or_else(|| "Missing --pathway".to_string())?;
    read_pathway_input(source).map_err(|e| e.to_string())
}

fn build_mapper(options: &Options) -> Result<MapperStack, String> {
    let mut stack = MapperStack::new();
    if let Some(path) = &options.mappings {
        let table = MappingTable::from_file(path).map_err(|e| e.to_string())?;
        stack.push(Box::new(table));
    }
    if options.use_bridge {
        let mapper =
            BridgeRestMapper::new(BridgeRestConfig::from_env()).map_err(|e| e.to_string())?;
        stack.push(Box::new(mapper));
    }
    Ok(stack)
}

fn build_client(options: &Options) -> Result<RheaClient, String> {
    let mut config = RheaConfig::from_env();
    if let Some(endpoint) = &options.endpoint {
        config.base_url = endpoint.clone();
    }
    RheaClient::new(config).map_err(|e| e.to_string())
}

fn list_interactions(doc: &PathwayDoc) -> Result<(), String> {
    println!("Pathway: {}", doc.name.as_deref().unwrap_or("(unnamed)"));
    if let Some(organism) = &doc.organism {
        println!("Organism: {organism}");
    }
    for interaction in &doc.interactions {
        let graph_id = interaction.graph_id.as_deref().unwrap_or("(no graph id)");
        let start = interaction.start_ref().unwrap_or("?");
        let end = interaction.end_ref().unwrap_or("?");
        let annotated = match &interaction.xref {
            Some(xref) => format!("  [{}:{}]", xref.database, xref.id),
            None => String::new(),
        };
        println!("  {graph_id}: {start} -> {end}{annotated}");
    }
    println!(
        "{} interaction(s), {} data node(s)",
        doc.interactions.len(),
        doc.data_nodes.len()
    );
    Ok(())
}

fn resolve_edge(doc: &PathwayDoc, mapper: &dyn IdMapper, graph_id: &str) -> Result<(), String> {
    let interaction = doc
        .interaction_by_graph_id(graph_id)
        .ok_or_else(|| format!("No interaction with graph id '{graph_id}'"))?;
    let index = ReferenceIndex::build(doc);
    for (side, graph_ref) in [
        ("start", interaction.start_ref()),
        ("end", interaction.end_ref()),
    ] {
        match graph_ref {
            Some(reference) => match resolve_search_identifier(&index, mapper, reference) {
                Some(identifier) => println!("{side}: {reference} -> {identifier}"),
                None => println!("{side}: {reference} -> (unresolved)"),
            },
            None => println!("{side}: (not connected)"),
        }
    }
    Ok(())
}

fn search_edge(
    doc: &mut PathwayDoc,
    mapper: &dyn IdMapper,
    client: &RheaClient,
    options: &Options,
    graph_id: &str,
) -> Result<(), String> {
    let mut presenter = ConsolePresenter::new(options.assume_yes, options.pick);
    let outcome = {
        let session = SearchSession::new(&*doc, mapper, client);
        session
            .run(graph_id, &mut presenter, &CancelToken::new())
            .map_err(|e| e.to_string())?
    };
    if let Some(chosen) = outcome.selected() {
        if doc.annotate_interaction(graph_id, &chosen.xref) {
            println!("Annotated '{graph_id}' with RHEA:{}", chosen.xref.id);
            if let Some(url) = chosen.xref.url(&DATA_SOURCES) {
                println!("  {url}");
            }
        }
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("ifind {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let (options, rest) = parse_options(&args)?;
    init_logging(options.verbose);
    if rest.is_empty() {
        usage();
        return Err("Missing command".to_string());
    }
    let command = rest[0].as_str();
    match command {
        "interactions" => {
            let doc = load_pathway(&options)?;
            list_interactions(&doc)
        }
        "resolve" => {
            if rest.len() <= 1 {
                usage();
                return Err("resolve requires an interaction graph id".to_string());
            }
            let doc = load_pathway(&options)?;
            let mapper = build_mapper(&options)?;
            resolve_edge(&doc, &mapper, &rest[1])
        }
        "search" => {
            if rest.len() <= 1 {
                usage();
                return Err("search requires an interaction graph id".to_string());
            }
            let mut doc = load_pathway(&options)?;
            let mapper = build_mapper(&options)?;
            let client = build_client(&options)?;
            search_edge(&mut doc, &mapper, &client, &options, &rest[1])
        }
        _ => {
            usage();
            Err(format!("Unknown command '{command}'"))
        }
    }
}
