use crate::{
    case::normalize,
    cli::{
        args::{parse_selector, parse_values, GlobalArgs, ProjectArgs},
        Cli, Commands,
    },
    config::{Config, FormatterKind},
    constants::MERGE_FIELD,
    error::{Error, Result},
    project::{NodeId, Project},
    template::Schema,
};
use log::{debug, info};
use serde_json::{json, Map, Value};
use std::path::Path;
use uuid::Uuid;

/// Dispatches one command line invocation.
pub struct Runner {
    global: GlobalArgs,
}

impl Runner {
    pub fn new(global: GlobalArgs) -> Self {
        Self { global }
    }

    pub fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Schema(args) => {
                let config = self.load_config(&args.template)?;
                let schema = Schema::load(&args.template, &config)?;
                print!("{}", describe_schema(&schema));
                Ok(())
            }
            Commands::Tree(args) => {
                let mut project = self.open(&args, false)?;
                let root = project.root();
                let tree = node_to_json(&mut project, root)?;
                println!("{}", serde_json::to_string_pretty(&tree)?);
                Ok(())
            }
            Commands::Create(args) => {
                let values = parse_values(&args.values)?;
                let mut project = self.open(&args.target, true)?;
                let parent = resolve(&mut project, &args.at)?;
                let id = args.id.unwrap_or_else(Uuid::new_v4);
                let child = project.create_child(parent, &args.namespace, id, values)?;
                project.flush(child)?;
                println!("Created {} {}.", args.namespace, id);
                Ok(())
            }
            Commands::Set(args) => {
                let values = parse_values(&args.values)?;
                let mut project = self.open(&args.target, false)?;
                let node = resolve(&mut project, &args.at)?;
                project.set_values(node, values)?;
                project.flush(node)?;
                println!("Updated {}.", describe(&project, node));
                Ok(())
            }
            Commands::Delete(args) => {
                let mut project = self.open(&args.target, false)?;
                let node = resolve(&mut project, &args.at)?;
                let parent = project.parent(node).ok_or(Error::RootDeletion)?;
                let label = describe(&project, node);
                project.delete(node)?;
                project.flush(parent)?;
                println!("Deleted {label}.");
                Ok(())
            }
        }
    }

    /// Loads the template configuration and applies command line overrides.
    fn load_config(&self, template: &Path) -> Result<Config> {
        let mut config = Config::load_config(template)?;
        if self.global.fixture {
            config.fixture_mode = true;
        }
        if self.global.no_format {
            config.formatter = FormatterKind::None;
        }
        config.validate()?;
        debug!("Using configuration {:?}", config);
        Ok(config)
    }

    fn open(&self, args: &ProjectArgs, create_root: bool) -> Result<Project> {
        let config = self.load_config(&args.template)?;
        if create_root && !args.project.exists() {
            std::fs::create_dir_all(&args.project)
                .map_err(|e| Error::fs("create directory", &args.project, e))?;
            info!("Created project directory {}", args.project.display());
        }
        if !args.project.is_dir() {
            return Err(Error::StructuralNotFound(format!(
                "project directory '{}'",
                args.project.display()
            )));
        }
        Project::open(&args.template, &args.project, &config)
    }
}

/// Runs the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    Runner::new(cli.global).run(cli.command)
}

/// Follows a selector from the root, matching each step on the merge field.
fn resolve(project: &mut Project, selector: &str) -> Result<NodeId> {
    let mut node = project.root();
    for step in parse_selector(selector)? {
        let wanted = normalize(&step.name);
        let children = project.children(node, &step.namespace)?;
        node = children
            .into_iter()
            .find(|child| normalize(project.value_string(*child, MERGE_FIELD)) == wanted)
            .ok_or_else(|| Error::StructuralNotFound(format!("{} '{}'", step.namespace, step.name)))?;
    }
    Ok(node)
}

fn describe(project: &Project, node: NodeId) -> String {
    match project.parent(node) {
        None => "project root".to_string(),
        Some(_) => format!("{} '{}'", project.namespace(node), project.value_string(node, MERGE_FIELD)),
    }
}

fn node_to_json(project: &mut Project, node: NodeId) -> Result<Value> {
    let mut children = Map::new();
    for child_ns in project.child_namespaces(node) {
        let mut list = Vec::new();
        for child in project.children(node, &child_ns)? {
            list.push(node_to_json(project, child)?);
        }
        children.insert(child_ns, Value::Array(list));
    }

    Ok(json!({
        "namespace": project.namespace(node),
        "id": project.id(node).to_string(),
        "values": project.values(node),
        "children": children,
    }))
}

/// One line per namespace, indented by depth.
fn describe_schema(schema: &Schema) -> String {
    let mut out = String::new();
    for (depth, id) in schema.walk() {
        let ns = schema.namespace(id);
        let name = if ns.name.is_empty() { "(root)" } else { ns.name.as_str() };
        let fields: Vec<&str> = ns.values.iter().map(String::as_str).collect();
        out.push_str(&format!(
            "{}{} [{}] entrypoints={} keys={} paths={}\n",
            "  ".repeat(depth),
            name,
            fields.join(", "),
            ns.entrypoints.len(),
            ns.keys.len(),
            ns.paths.len(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{parser::parse_name, TemplateKind, TemplateTree};

    #[test]
    fn describes_namespaces_by_depth() {
        let mut tree = TemplateTree::default();
        let name = parse_name(&mut tree, "{!service_name}").unwrap();
        let service = tree.push(TemplateKind::Dir { name, items: vec![], entry: false, next_in_key_path: None });
        let root_name = parse_name(&mut tree, "template").unwrap();
        let root = tree.push(TemplateKind::Dir { name: root_name, items: vec![service], entry: false, next_in_key_path: None });
        let schema = Schema::from_tree(tree, root).unwrap();

        assert_eq!(
            describe_schema(&schema),
            "(root) [path] entrypoints=1 keys=1 paths=1\n  service [name] entrypoints=1 keys=1 paths=1\n"
        );
    }
}
