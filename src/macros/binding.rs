//! Argument binding: matching a command's concrete arguments against the
//! required and optional parameters a macro declares.
//!
//! Anonymous arguments bind positionally, first to the required parameters and
//! then to the optional ones, both in declared order. Named arguments bind by
//! name. Optional parameters left unbound receive their declared default, whose
//! markup source is parsed in non-paragraph mode when the renderer needs it.
//!
//! Failures list the offending parameters deterministically: missing names in
//! declared order, unknown positions in order, unknown names sorted.

use ::std::collections::BTreeMap;

use crate::ast::{Arguments, Command, NodeId, Tree};
use crate::config::FolioConfig;
use crate::errors::{ErrorKind, FolioError};
use crate::syntax::parser::{ParseOptions, Parser};

use super::{MacroDefinition, MacroTable};

/// The value a parameter is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound<'d> {
    /// An argument section supplied by the command.
    Supplied(NodeId),
    /// The markup source of the parameter's default value.
    Default(&'d str),
}

/// Parameter name to bound value.
pub type Binding<'d> = BTreeMap<String, Bound<'d>>;

pub fn bind_arguments<'d>(
    definition: &'d MacroDefinition,
    command: &Command,
    line: usize,
) -> Result<Binding<'d>, FolioError> {
    let mut binding = match &command.arguments {
        Arguments::Anonymous(list) => bind_anonymous(definition, list, line)?,
        Arguments::Named(map) => bind_named(definition, map, line)?,
    };
    for (name, default) in &definition.optional {
        binding
            .entry(name.clone())
            .or_insert(Bound::Default(default.as_str()));
    }
    Ok(binding)
}

fn bind_anonymous<'d>(
    definition: &'d MacroDefinition,
    list: &[NodeId],
    line: usize,
) -> Result<Binding<'d>, FolioError> {
    let required = definition.required.len();
    if list.len() < required {
        return Err(ErrorKind::MissingArguments {
            line,
            command: definition.name.clone(),
            names: definition.required[list.len()..].to_vec(),
        }
        .into());
    }
    let capacity = definition.parameter_count();
    if list.len() > capacity {
        return Err(ErrorKind::UnknownArguments {
            line,
            command: definition.name.clone(),
            names: (capacity + 1..=list.len()).map(|i| format!("#{}", i)).collect(),
        }
        .into());
    }

    let names = definition
        .required
        .iter()
        .chain(definition.optional.iter().map(|(name, _)| name));
    Ok(names
        .zip(list)
        .map(|(name, id)| (name.clone(), Bound::Supplied(*id)))
        .collect())
}

fn bind_named<'d>(
    definition: &'d MacroDefinition,
    map: &BTreeMap<String, NodeId>,
    line: usize,
) -> Result<Binding<'d>, FolioError> {
    let missing: Vec<String> = definition
        .required
        .iter()
        .filter(|name| !map.contains_key(*name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ErrorKind::MissingArguments {
            line,
            command: definition.name.clone(),
            names: missing,
        }
        .into());
    }

    // BTreeMap keys are already sorted.
    let unknown: Vec<String> = map
        .keys()
        .filter(|name| !definition.is_parameter(name))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(ErrorKind::UnknownArguments {
            line,
            command: definition.name.clone(),
            names: unknown,
        }
        .into());
    }

    Ok(map
        .iter()
        .map(|(name, id)| (name.clone(), Bound::Supplied(*id)))
        .collect())
}

/// Parses the default value of an optional parameter into its own tree.
pub fn parse_default(
    source: &str,
    macros: &mut MacroTable,
    config: &FolioConfig,
    format: &str,
) -> Result<Tree, FolioError> {
    let options = ParseOptions::fragment(format);
    Parser::new(source, "<default argument>", config, macros, options).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    fn test_macro() -> MacroDefinition {
        MacroDefinition::new("testMacro", "")
            .with_required(&["aOne", "bTwo"])
            .with_optional("cThree", "three")
    }

    fn command_with(arguments: Arguments) -> Command {
        let mut command = Command::new("testCmd", "");
        command.arguments = arguments;
        command
    }

    fn sections(tree: &mut Tree, n: usize) -> Vec<NodeId> {
        (0..n)
            .map(|_| tree.push(NodeKind::Section { children: vec![] }, 1, 0))
            .collect()
    }

    #[test]
    fn anonymous_binds_required_then_optional() {
        let mut tree = Tree::new();
        let ids = sections(&mut tree, 3);
        let def = test_macro();
        let command = command_with(Arguments::Anonymous(ids.clone()));
        let binding = bind_arguments(&def, &command, 1).unwrap();
        assert_eq!(binding["aOne"], Bound::Supplied(ids[0]));
        assert_eq!(binding["bTwo"], Bound::Supplied(ids[1]));
        assert_eq!(binding["cThree"], Bound::Supplied(ids[2]));
    }

    #[test]
    fn unbound_optional_gets_default() {
        let mut tree = Tree::new();
        let ids = sections(&mut tree, 2);
        let def = test_macro();
        let command = command_with(Arguments::Anonymous(ids));
        let binding = bind_arguments(&def, &command, 1).unwrap();
        assert_eq!(binding["cThree"], Bound::Default("three"));
    }

    #[test]
    fn too_few_anonymous_lists_missing_in_order() {
        let mut tree = Tree::new();
        let ids = sections(&mut tree, 1);
        let def = test_macro();
        let command = command_with(Arguments::Anonymous(ids));
        let err = bind_arguments(&def, &command, 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Line 4: command "testMacro" is missing 1 argument: [bTwo]"#
        );
    }

    #[test]
    fn named_missing_and_unknown() {
        let mut tree = Tree::new();
        let ids = sections(&mut tree, 3);
        let def = test_macro();

        let mut map = BTreeMap::new();
        map.insert("bTwo".to_string(), ids[0]);
        let command = command_with(Arguments::Named(map));
        let err = bind_arguments(&def, &command, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Line 2: command "testMacro" is missing 1 argument: [aOne]"#
        );

        let mut map = BTreeMap::new();
        map.insert("aOne".to_string(), ids[0]);
        map.insert("bTwo".to_string(), ids[1]);
        map.insert("zeta".to_string(), ids[2]);
        map.insert("alpha".to_string(), ids[2]);
        let command = command_with(Arguments::Named(map));
        let err = bind_arguments(&def, &command, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Line 2: command "testMacro" contains 2 unknown arguments: [alpha zeta]"#
        );
    }
}
