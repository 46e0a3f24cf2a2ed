use crate::model::{CommandId, CommandModel, ParameterId};

/// A raw value mapped to a parameter. `None` for a bare switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedParameter {
    pub parameter: ParameterId,
    pub value: Option<String>,
}

/// One matched command and the values mapped to its own parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTreeNode {
    pub command: CommandId,
    /// In order of occurrence.
    pub mapped: Vec<MappedParameter>,
}

impl CommandTreeNode {
    pub fn new(command: CommandId) -> Self {
        Self {
            command,
            mapped: Vec::new(),
        }
    }

    pub fn is_mapped(&self, parameter: ParameterId) -> bool {
        self.mapped.iter().any(|mapped| mapped.parameter == parameter)
    }

    /// Every raw value mapped to `parameter`.
    pub fn values(&self, parameter: ParameterId) -> impl Iterator<Item = Option<&str>> {
        self.mapped
            .iter()
            .filter(move |mapped| mapped.parameter == parameter)
            .map(|mapped| mapped.value.as_deref())
    }
}

/// The commands matched for one invocation, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTree {
    pub nodes: Vec<CommandTreeNode>,
}

impl CommandTree {
    /// The command to execute.
    pub fn leaf(&self) -> Option<&CommandTreeNode> {
        self.nodes.last()
    }

    /// Names of the matched commands, root first.
    pub fn path<'m>(&self, model: &'m CommandModel) -> Vec<&'m str> {
        self.nodes
            .iter()
            .map(|node| model.command(node.command).name.as_str())
            .collect()
    }
}

