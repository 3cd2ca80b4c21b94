use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indexmap::IndexMap;
use labgrid_grid::{AssignOutcome, CommitOutcome, GridContext, GridError, Level, TableKind, TableSession};
use labgrid_types::{CellKind, CellValue, FilterSet, GridConfig, OptionItem, Row, RowId};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

fn table_arg() -> Arg {
    Arg::new("table")
        .long("table")
        .short('t')
        .default_value("samples")
        .value_parser(["samples", "marker-analysis", "analysis-samples"])
        .help("Table preset")
}

fn cli() -> Command {
    Command::new("labgrid")
        .version(labgrid_grid::VERSION)
        .about("Browse and edit sample tables of a sample-tracking backend")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .global(true)
                .help("Backend origin"),
        )
        .arg(
            Arg::new("order")
                .long("order")
                .global(true)
                .value_parser(value_parser!(u64))
                .help("Order the sample tables are scoped to"),
        )
        .arg(
            Arg::new("analysis-order")
                .long("analysis-order")
                .global(true)
                .value_parser(value_parser!(u64))
                .help("Analysis order scoping marker search"),
        )
        .arg(
            Arg::new("csrf")
                .long("csrf")
                .global(true)
                .env("LABGRID_CSRF_TOKEN")
                .help("CSRF token for mutating requests"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("list")
                .about("Stream every page of a table as JSON lines")
                .arg(table_arg())
                .arg(
                    Arg::new("filter")
                        .long("filter")
                        .short('f')
                        .action(ArgAction::Append)
                        .help("Filter as key=value (e.g. name__istartswith=bear)"),
                )
                .arg(
                    Arg::new("marker")
                        .long("marker")
                        .short('m')
                        .action(ArgAction::Append)
                        .help("Marker name (repeatable)"),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(usize))
                        .help("Stop after this many rows"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete rows by id")
                .arg(table_arg())
                .arg(
                    Arg::new("ids")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(u64))
                        .help("Row ids"),
                ),
        )
        .subcommand(
            Command::new("patch")
                .about("Edit one sample field")
                .arg(Arg::new("id").required(true).value_parser(value_parser!(u64)))
                .arg(Arg::new("field").required(true))
                .arg(Arg::new("value").required(true).allow_hyphen_values(true)),
        )
        .subcommand(
            Command::new("options")
                .about("Search the options of a select column")
                .arg(Arg::new("field").required(true))
                .arg(Arg::new("text").default_value("")),
        )
        .subcommand(
            Command::new("assign")
                .about("Assign staff through an update URL")
                .arg(Arg::new("url").required(true))
                .arg(
                    Arg::new("user-ids")
                        .num_args(0..)
                        .value_parser(value_parser!(u64))
                        .help("User ids (none clears the assignment)"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("labgrid=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<GridConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => GridConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => GridConfig::default(),
    };
    if let Some(url) = matches.get_one::<String>("base-url") {
        config = config.with_base_url(url.clone());
    }
    if let Some(order) = matches.get_one::<u64>("order") {
        config = config.with_order(*order);
    }
    if let Some(order) = matches.get_one::<u64>("analysis-order") {
        config = config.with_analysis_order(*order);
    }
    if let Some(token) = matches.get_one::<String>("csrf") {
        config = config.with_csrf_token(token.clone());
    }
    config.validate()?;
    Ok(config)
}

fn table_kind(args: &ArgMatches) -> anyhow::Result<TableKind> {
    let name = args
        .get_one::<String>("table")
        .map_or("samples", String::as_str);
    TableKind::from_name(name).with_context(|| format!("unknown table {name}"))
}

fn parse_filters(args: &ArgMatches) -> anyhow::Result<FilterSet> {
    let mut filters = FilterSet::new();
    for raw in args.get_many::<String>("filter").into_iter().flatten() {
        let (key, value) = raw
            .split_once('=')
            .with_context(|| format!("filter {raw:?} is not key=value"))?;
        filters.insert_raw(key.trim(), value);
    }
    Ok(filters)
}

fn print_row(kind: TableKind, row: &Row) -> anyhow::Result<()> {
    let mut out = IndexMap::new();
    out.insert("id", Value::from(row.id().get()));
    for column in kind.columns() {
        out.insert(column.path, row.get_path(column.path).cloned().unwrap_or(Value::Null));
    }
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn print_notifications(context: &GridContext) {
    for notification in context.notifications().active() {
        match notification.level {
            Level::Success => eprintln!("{}", notification.message),
            Level::Error => eprintln!("error: {}", notification.message),
        }
    }
}

async fn list(context: &GridContext, args: &ArgMatches) -> anyhow::Result<()> {
    let kind = table_kind(args)?;
    let limit = args.get_one::<usize>("limit").copied().unwrap_or(usize::MAX);
    let table = context.table(kind);
    table.set_filters(parse_filters(args)?);
    table.set_markers(args.get_many::<String>("marker").into_iter().flatten().cloned().collect());

    let mut view = table.load().await?;
    while view.has_more && view.len() < limit {
        context.cache().load_more(&table.identity()).await?;
        view = table.view();
    }
    for row in view.rows().take(limit) {
        print_row(kind, row)?;
    }
    Ok(())
}

async fn delete(context: &GridContext, args: &ArgMatches) -> anyhow::Result<()> {
    let kind = table_kind(args)?;
    let ids: Vec<RowId> = args
        .get_many::<u64>("ids")
        .into_iter()
        .flatten()
        .map(|id| RowId(*id))
        .collect();
    let table = context.table(kind);

    if kind.supports_bulk_delete() {
        for id in &ids {
            table.toggle_row(*id);
        }
        let deleted = table.delete_selected().await;
        print_notifications(context);
        deleted?;
    } else if kind.supports_row_delete() {
        for id in ids {
            let result = table.delete_row(id).await;
            print_notifications(context);
            result?;
        }
    } else {
        bail!("{kind} rows cannot be deleted");
    }
    Ok(())
}

/// Load pages until `id` is loaded, then mount its `field` editor
async fn mount_cell(table: &TableSession, context: &GridContext, id: RowId, field: &str) -> anyhow::Result<()> {
    let mut view = table.load().await?;
    loop {
        match table.mount_cell(id, field) {
            Err(GridError::RowNotLoaded(_)) if view.has_more => {
                context.cache().load_more(&table.identity()).await?;
                view = table.view();
            }
            other => return other.map_err(Into::into),
        }
    }
}

async fn parse_value(context: &GridContext, kind: CellKind, field: &str, input: &str) -> anyhow::Result<CellValue> {
    Ok(match kind {
        CellKind::Text => CellValue::Text(input.to_string()),
        CellKind::Number if input.trim().is_empty() => CellValue::Empty,
        CellKind::Number => CellValue::Number(
            input
                .trim()
                .parse()
                .with_context(|| format!("{input:?} is not a number"))?,
        ),
        CellKind::Date => CellValue::parse_date(input.trim())?,
        CellKind::Select | CellKind::MultiSelect => {
            let mut chosen = Vec::new();
            for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                chosen.push(resolve_option(context, field, part).await?);
            }
            if kind == CellKind::Select {
                chosen.into_iter().next().map_or(CellValue::Empty, CellValue::Select)
            } else {
                CellValue::MultiSelect(chosen)
            }
        }
    })
}

async fn resolve_option(context: &GridContext, field: &str, text: &str) -> anyhow::Result<OptionItem> {
    if let Ok(id) = text.parse::<u64>() {
        return Ok(OptionItem::new(id, text));
    }
    let options = context.search_options(field, text).await?;
    options
        .iter()
        .find(|o| o.name.eq_ignore_ascii_case(text))
        .cloned()
        .with_context(|| format!("no {field} option named {text:?}"))
}

async fn patch(context: &GridContext, args: &ArgMatches) -> anyhow::Result<()> {
    let id = RowId(*args.get_one::<u64>("id").context("id is required")?);
    let field = args.get_one::<String>("field").context("field is required")?;
    let input = args.get_one::<String>("value").context("value is required")?;

    let table = context.table(TableKind::Samples);
    let kind = TableKind::Samples
        .editor(field)
        .with_context(|| format!("{field} is not editable"))?;
    mount_cell(&table, context, id, field).await?;
    let value = parse_value(context, kind, field, input).await?;

    table.focus_cell(id, field)?;
    table.edit_cell(id, field, value)?;
    let outcome = table.blur_cell(id, field).await?;
    print_notifications(context);
    match outcome {
        CommitOutcome::Unchanged => println!("unchanged"),
        CommitOutcome::Saved => println!("saved"),
        CommitOutcome::Failed(error) => bail!("{}", error.messages.join("; ")),
    }
    Ok(())
}

async fn options(context: &GridContext, args: &ArgMatches) -> anyhow::Result<()> {
    let field = args.get_one::<String>("field").context("field is required")?;
    let text = args.get_one::<String>("text").map_or("", String::as_str);
    for option in context.search_options(field, text).await?.iter() {
        println!("{}\t{}", option.value_key(), option.name);
    }
    Ok(())
}

async fn assign(context: &GridContext, args: &ArgMatches) -> anyhow::Result<()> {
    let url = args.get_one::<String>("url").context("url is required")?;
    let user_ids: Vec<u64> = args.get_many::<u64>("user-ids").into_iter().flatten().copied().collect();
    let form = context.staff_assignment(url.clone());
    match form.assign(&user_ids).await {
        AssignOutcome::Saved => println!("saved"),
        AssignOutcome::Failed(e) => bail!("assignment failed: {e}"),
        AssignOutcome::Superseded => println!("superseded"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = load_config(&matches)?;
    let context = GridContext::http(config).context("building HTTP client")?;

    match matches.subcommand() {
        Some(("list", args)) => list(&context, args).await,
        Some(("delete", args)) => delete(&context, args).await,
        Some(("patch", args)) => patch(&context, args).await,
        Some(("options", args)) => options(&context, args).await,
        Some(("assign", args)) => assign(&context, args).await,
        _ => Ok(()),
    }
}
