mod profile;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use cabinet_api::{Cabinet, CreateProjectRequest};
use cabinet_client::{
    AssignToBoxOptions, ClientConfig, PhysicalItemKind, PhysicalItemSpec, UserSpec,
};
use cabinet_core::{
    CategoryId, ClassificationId, MutationOp, NodeId, Recursion, ServiceError,
};

use profile::Profile;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "cab")]
#[command(about = "Cabinet content repository CLI")]
struct Cli {
    /// Connection profile written by `cab auth connect`.
    #[arg(long, default_value = "./cabinet.profile.json")]
    profile: PathBuf,

    /// 32-byte hex key file protecting the connection profile.
    #[arg(long)]
    key_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Auth {
        #[command(subcommand)]
        command: Box<AuthCommand>,
    },
    Node {
        #[command(subcommand)]
        command: Box<NodeCommand>,
    },
    Attribute {
        #[command(subcommand)]
        command: Box<AttributeCommand>,
    },
    Category {
        #[command(subcommand)]
        command: Box<CategoryCommand>,
    },
    Classification {
        #[command(subcommand)]
        command: Box<ClassificationCommand>,
    },
    Records {
        #[command(subcommand)]
        command: Box<RecordsCommand>,
    },
    User {
        #[command(subcommand)]
        command: Box<UserCommand>,
    },
    Phys {
        #[command(subcommand)]
        command: Box<PhysCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Encrypt a password under the profile key without saving it.
    EncryptPassword(EncryptPasswordArgs),
    /// Open a session, then save the encrypted connection profile.
    Connect(ConnectArgs),
}

#[derive(Debug, Args)]
struct EncryptPasswordArgs {
    #[arg(long)]
    password: String,
}

#[derive(Debug, Args)]
struct ConnectArgs {
    /// Services directory, e.g. https://server.domain/cws/
    #[arg(long)]
    url: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
}

#[derive(Debug, Subcommand)]
enum NodeCommand {
    CreateProject(CreateProjectArgs),
    CreateFolder(CreateFolderArgs),
    Remove(RemoveNodeArgs),
}

#[derive(Debug, Args)]
struct CreateProjectArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    parent: i64,
    /// Workspace whose configuration is copied onto the new project.
    #[arg(long)]
    template: Option<i64>,
}

#[derive(Debug, Args)]
struct CreateFolderArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    parent: i64,
}

#[derive(Debug, Args)]
struct RemoveNodeArgs {
    #[arg(long)]
    node: i64,
}

#[derive(Debug, Subcommand)]
enum AttributeCommand {
    Update(AttributeUpdateArgs),
    Clear(AttributeClearArgs),
}

#[derive(Debug, Args)]
struct AttributeUpdateArgs {
    #[arg(long)]
    node: i64,
    #[arg(long)]
    category: i64,
    #[arg(long)]
    attribute: String,
    /// Values to set; JSON scalars are parsed, anything else is taken
    /// as a string.
    #[arg(long = "value", required = true)]
    values: Vec<String>,
    /// Existing values to swap out, matched positionally.
    #[arg(long = "replace")]
    replace: Vec<String>,
    /// Append instead of overwriting.
    #[arg(long, default_value_t = false)]
    add: bool,
    #[arg(long, default_value_t = false)]
    recurse: bool,
}

#[derive(Debug, Args)]
struct AttributeClearArgs {
    #[arg(long)]
    node: i64,
    #[arg(long)]
    category: i64,
    #[arg(long)]
    attribute: String,
    #[arg(long, default_value_t = false)]
    recurse: bool,
}

#[derive(Debug, Subcommand)]
enum CategoryCommand {
    /// Copy the full category set from a source node.
    CopyAll(CategoryCopyAllArgs),
    /// Copy a single category from a source node.
    Copy(CategoryCopyArgs),
}

#[derive(Debug, Args)]
struct CategoryCopyAllArgs {
    #[arg(long)]
    source: i64,
    #[arg(long)]
    target: i64,
    #[arg(long, default_value_t = false)]
    merge_categories: bool,
    #[arg(long, default_value_t = false)]
    merge_attributes: bool,
    #[arg(long, default_value_t = false)]
    recurse: bool,
}

#[derive(Debug, Args)]
struct CategoryCopyArgs {
    #[arg(long)]
    source: i64,
    #[arg(long)]
    target: i64,
    #[arg(long)]
    category: i64,
    #[arg(long, default_value_t = false)]
    merge_attributes: bool,
    #[arg(long, default_value_t = false)]
    recurse: bool,
}

#[derive(Debug, Subcommand)]
enum ClassificationCommand {
    Add(ClassificationAddArgs),
}

#[derive(Debug, Args)]
struct ClassificationAddArgs {
    #[arg(long)]
    node: i64,
    #[arg(long = "classification", required = true)]
    classifications: Vec<i64>,
    #[arg(long, default_value_t = false)]
    recurse: bool,
}

#[derive(Debug, Subcommand)]
enum RecordsCommand {
    /// Apply a records-management classification.
    Classify(RecordsClassifyArgs),
    /// Finalise a record, locking it against further change.
    Finalise(RecordsFinaliseArgs),
}

#[derive(Debug, Args)]
struct RecordsClassifyArgs {
    #[arg(long)]
    node: i64,
    #[arg(long)]
    classification: i64,
    #[arg(long, default_value_t = false)]
    recurse: bool,
}

#[derive(Debug, Args)]
struct RecordsFinaliseArgs {
    #[arg(long)]
    node: i64,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    Add(UserAddArgs),
    Remove(UserRemoveArgs),
    /// Resolve a user id from a login name.
    Id(UserIdArgs),
}

#[derive(Debug, Args)]
struct UserAddArgs {
    #[arg(long)]
    login: String,
    #[arg(long)]
    department_group: i64,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    middle_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    fax: Option<String>,
    #[arg(long)]
    office_location: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    login_enabled: Option<bool>,
    #[arg(long)]
    public_access_enabled: Option<bool>,
    #[arg(long)]
    create_update_users: Option<bool>,
    #[arg(long)]
    create_update_groups: Option<bool>,
    #[arg(long)]
    can_administer_users: Option<bool>,
    #[arg(long)]
    can_administer_system: Option<bool>,
}

#[derive(Debug, Args)]
struct UserRemoveArgs {
    #[arg(long)]
    user: i64,
}

#[derive(Debug, Args)]
struct UserIdArgs {
    #[arg(long)]
    login: String,
}

#[derive(Debug, Subcommand)]
enum PhysCommand {
    AddItem(PhysAddArgs),
    AddContainer(PhysAddArgs),
    AddBox(PhysAddArgs),
    /// Assign a physical item to a box.
    ToBox(PhysToBoxArgs),
}

#[derive(Debug, Args)]
struct PhysAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    parent: i64,
    #[arg(long)]
    subtype: i64,
    #[arg(long)]
    home_location: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    unique_id: Option<String>,
    #[arg(long)]
    keywords: Option<String>,
    #[arg(long)]
    locator_type: Option<String>,
    #[arg(long)]
    reference_rate: Option<String>,
    #[arg(long)]
    offsite_storage_id: Option<String>,
    #[arg(long)]
    client_name: Option<String>,
    #[arg(long)]
    temporary_id: Option<String>,
    #[arg(long)]
    label_type: Option<String>,
    #[arg(long)]
    client_id: Option<i64>,
    #[arg(long)]
    number_of_copies: Option<i64>,
    #[arg(long)]
    number_of_labels: Option<i64>,
    #[arg(long)]
    number_of_items: Option<i64>,
    #[arg(long, default_value_t = false)]
    generate_label: bool,
    /// RFC3339 UTC timestamp.
    #[arg(long)]
    from_date: Option<String>,
    /// RFC3339 UTC timestamp.
    #[arg(long)]
    to_date: Option<String>,
}

#[derive(Debug, Args)]
struct PhysToBoxArgs {
    #[arg(long)]
    item: i64,
    #[arg(long = "box")]
    box_id: i64,
    #[arg(long, default_value_t = false)]
    update_location: bool,
    #[arg(long, default_value_t = false)]
    update_rsi: bool,
    #[arg(long, default_value_t = false)]
    update_status: bool,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn emit_json_line(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string(&with_contract_version(value))?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Auth { command } = &cli.command {
        return run_auth(command, &cli);
    }

    // Every other command is a session precondition: without an opened
    // connection nothing is attempted against the repository.
    let mut cabinet = open_session(&cli)?;
    match cli.command {
        Command::Auth { .. } => Ok(()),
        Command::Node { command } => run_node(*command, &mut cabinet),
        Command::Attribute { command } => run_attribute(*command, &mut cabinet),
        Command::Category { command } => run_category(*command, &mut cabinet),
        Command::Classification { command } => run_classification(*command, &mut cabinet),
        Command::Records { command } => run_records(*command, &mut cabinet),
        Command::User { command } => run_user(*command, &mut cabinet),
        Command::Phys { command } => run_phys(*command, &mut cabinet),
    }
}

fn required_key(cli: &Cli) -> Result<[u8; 32]> {
    let path = cli
        .key_file
        .as_ref()
        .ok_or_else(|| anyhow!("provide --key-file with a 32-byte hex key"))?;
    profile::read_hex_key_file(path)
}

fn open_session(cli: &Cli) -> Result<Cabinet> {
    if !cli.profile.exists() {
        return Err(anyhow!(
            "{}; open it first with `cab auth connect`",
            ServiceError::NotConnected
        ));
    }
    let key = required_key(cli).context("the connection profile is encrypted")?;
    let config = profile::load(&cli.profile, &key)?;
    tracing::debug!(profile = %cli.profile.display(), user = %config.username, "profile decrypted");
    Cabinet::connect(&config)
}

fn run_auth(command: &AuthCommand, cli: &Cli) -> Result<()> {
    match command {
        AuthCommand::EncryptPassword(args) => {
            let key = required_key(cli)?;
            let blob = profile::encrypt_password(&key, &args.password)?;
            emit_json(serde_json::json!({
                "encrypted": hex::encode(blob),
                "algorithm": profile::ENCRYPTION_ALGORITHM,
            }))
        }
        AuthCommand::Connect(args) => {
            let key = required_key(cli)?;

            // Establish the session first; a profile is only worth
            // saving when the credentials actually work.
            let config = ClientConfig {
                services_url: args.url.clone(),
                username: args.username.clone(),
                password: args.password.clone(),
            };
            Cabinet::connect(&config)?;

            let blob = profile::encrypt_password(&key, &args.password)?;
            let saved = Profile {
                services_url: args.url.clone(),
                username: args.username.clone(),
                password: hex::encode(blob),
            };
            profile::save(&cli.profile, &key, &saved)?;

            emit_json(serde_json::json!({
                "status": "connection established",
                "profile": cli.profile,
                "signature_algorithm": profile::SIGNATURE_ALGORITHM,
            }))
        }
    }
}

fn run_node(command: NodeCommand, cabinet: &mut Cabinet) -> Result<()> {
    match command {
        NodeCommand::CreateProject(args) => {
            let creation = cabinet.create_project(&CreateProjectRequest {
                name: args.name,
                parent: NodeId(args.parent),
                template: args.template.map(NodeId),
            })?;
            emit_json(serde_json::json!({
                "id": creation.node,
                "warnings": creation.warnings,
            }))
        }
        NodeCommand::CreateFolder(args) => {
            let creation = cabinet.create_folder(&args.name, NodeId(args.parent))?;
            emit_json(serde_json::json!({
                "id": creation.node,
                "warnings": creation.warnings,
            }))
        }
        NodeCommand::Remove(args) => {
            let message = cabinet.remove_node(NodeId(args.node))?;
            emit_json(serde_json::json!({
                "node": args.node,
                "message": message,
            }))
        }
    }
}

fn run_attribute(command: AttributeCommand, cabinet: &mut Cabinet) -> Result<()> {
    match command {
        AttributeCommand::Update(args) => {
            let op = MutationOp::UpdateAttribute {
                category: CategoryId(args.category),
                attribute: args.attribute,
                values: args.values.iter().map(|raw| parse_value(raw)).collect(),
                replace: args.replace.iter().map(|raw| parse_value(raw)).collect(),
                add: args.add,
            };
            run_apply(cabinet, args.node, &op, args.recurse)
        }
        AttributeCommand::Clear(args) => {
            let op = MutationOp::ClearAttribute {
                category: CategoryId(args.category),
                attribute: args.attribute,
            };
            run_apply(cabinet, args.node, &op, args.recurse)
        }
    }
}

fn run_category(command: CategoryCommand, cabinet: &mut Cabinet) -> Result<()> {
    match command {
        CategoryCommand::CopyAll(args) => {
            let op = MutationOp::CopyCategories {
                source: NodeId(args.source),
                merge_categories: args.merge_categories,
                merge_attributes: args.merge_attributes,
            };
            run_apply(cabinet, args.target, &op, args.recurse)
        }
        CategoryCommand::Copy(args) => {
            let op = MutationOp::CopyCategory {
                source: NodeId(args.source),
                category: CategoryId(args.category),
                merge_attributes: args.merge_attributes,
            };
            run_apply(cabinet, args.target, &op, args.recurse)
        }
    }
}

fn run_classification(command: ClassificationCommand, cabinet: &mut Cabinet) -> Result<()> {
    match command {
        ClassificationCommand::Add(args) => {
            let op = MutationOp::AssignClassifications {
                classifications: args.classifications.into_iter().map(ClassificationId).collect(),
            };
            run_apply(cabinet, args.node, &op, args.recurse)
        }
    }
}

fn run_records(command: RecordsCommand, cabinet: &mut Cabinet) -> Result<()> {
    match command {
        RecordsCommand::Classify(args) => {
            let op = MutationOp::AssignRmClassification {
                classification: ClassificationId(args.classification),
            };
            run_apply(cabinet, args.node, &op, args.recurse)
        }
        RecordsCommand::Finalise(args) => {
            cabinet.finalise_record(NodeId(args.node))?;
            emit_json(serde_json::json!({
                "node": args.node,
                "status": "finalised",
            }))
        }
    }
}

fn run_user(command: UserCommand, cabinet: &mut Cabinet) -> Result<()> {
    match command {
        UserCommand::Add(args) => {
            let spec = UserSpec {
                login: args.login,
                department_group: NodeId(args.department_group),
                password: args.password,
                first_name: args.first_name,
                middle_name: args.middle_name,
                last_name: args.last_name,
                email: args.email,
                fax: args.fax,
                office_location: args.office_location,
                phone: args.phone,
                title: args.title,
                login_enabled: args.login_enabled,
                public_access_enabled: args.public_access_enabled,
                create_update_users: args.create_update_users,
                create_update_groups: args.create_update_groups,
                can_administer_users: args.can_administer_users,
                can_administer_system: args.can_administer_system,
            };
            let id = cabinet.add_user(&spec)?;
            emit_json(serde_json::json!({ "id": id }))
        }
        UserCommand::Remove(args) => {
            cabinet.remove_user(NodeId(args.user))?;
            emit_json(serde_json::json!({
                "user": args.user,
                "status": "deleted",
            }))
        }
        UserCommand::Id(args) => {
            let id = cabinet.user_id_by_login(&args.login)?;
            emit_json(serde_json::json!({
                "login": args.login,
                "id": id,
            }))
        }
    }
}

fn run_phys(command: PhysCommand, cabinet: &mut Cabinet) -> Result<()> {
    match command {
        PhysCommand::AddItem(args) => run_phys_add(cabinet, PhysicalItemKind::Item, args),
        PhysCommand::AddContainer(args) => {
            run_phys_add(cabinet, PhysicalItemKind::Container, args)
        }
        PhysCommand::AddBox(args) => run_phys_add(cabinet, PhysicalItemKind::Box, args),
        PhysCommand::ToBox(args) => {
            cabinet.assign_to_box(
                NodeId(args.item),
                NodeId(args.box_id),
                AssignToBoxOptions {
                    update_location: args.update_location,
                    update_rsi: args.update_rsi,
                    update_status: args.update_status,
                },
            )?;
            emit_json(serde_json::json!({
                "item": args.item,
                "box": args.box_id,
                "status": "assigned",
            }))
        }
    }
}

fn run_phys_add(cabinet: &mut Cabinet, kind: PhysicalItemKind, args: PhysAddArgs) -> Result<()> {
    let spec = PhysicalItemSpec {
        name: args.name,
        parent: NodeId(args.parent),
        subtype: args.subtype,
        home_location: args.home_location,
        description: args.description,
        unique_id: args.unique_id,
        keywords: args.keywords,
        locator_type: args.locator_type,
        reference_rate: args.reference_rate,
        offsite_storage_id: args.offsite_storage_id,
        client_name: args.client_name,
        temporary_id: args.temporary_id,
        label_type: args.label_type,
        client_id: args.client_id,
        number_of_copies: args.number_of_copies,
        number_of_labels: args.number_of_labels,
        number_of_items: args.number_of_items,
        generate_label: args.generate_label,
        from_date: args.from_date.as_deref().map(parse_rfc3339).transpose()?,
        to_date: args.to_date.as_deref().map(parse_rfc3339).transpose()?,
    };
    let id = cabinet.add_physical_item(kind, &spec)?;
    emit_json(serde_json::json!({
        "id": id,
        "kind": kind.as_str(),
    }))
}

fn run_apply(cabinet: &mut Cabinet, root: i64, op: &MutationOp, recurse: bool) -> Result<()> {
    let recursion = if recurse { Recursion::Subtree } else { Recursion::RootOnly };
    let walk = cabinet.apply(NodeId(root), op, recursion)?;
    for outcome in walk {
        emit_json_line(serde_json::to_value(&outcome).context("failed to serialize outcome")?)?;
    }
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    let parsed = OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 UTC timestamp: {value}"))?;

    if parsed.offset() != time::UtcOffset::UTC {
        return Err(anyhow!("timestamp MUST use UTC offset Z (received: {value})"));
    }

    Ok(parsed)
}
