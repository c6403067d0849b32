use std::fmt;

use super::address::Ipv4Settings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContextState {
    #[default]
    Idle,
    Enabling,
    Disabling,
    Active,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextState::Idle => "idle",
            ContextState::Enabling => "enabling",
            ContextState::Disabling => "disabling",
            ContextState::Active => "active",
        };
        f.write_str(name)
    }
}

/// Out-of-band events surfaced to the owner of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextNotification {
    /// The network or modem tore the context down without a caller request.
    Deactivated { context_id: u32 },
}

/// Lifecycle record of the single context driven by a state machine.
///
/// Every mutator updates state, call id and addressing together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct ContextData {
    state: ContextState,
    context_id: Option<u32>,
    call_id: Option<i32>,
    settings: Option<Ipv4Settings>,
}

impl ContextData {
    pub(super) fn state(&self) -> ContextState {
        self.state
    }

    pub(super) fn context_id(&self) -> Option<u32> {
        self.context_id
    }

    pub(super) fn call_id(&self) -> Option<i32> {
        self.call_id
    }

    pub(super) fn settings(&self) -> Option<&Ipv4Settings> {
        self.settings.as_ref()
    }

    pub(super) fn set_disconnected(&mut self) {
        *self = Self::default();
    }

    pub(super) fn begin_enabling(&mut self, context_id: u32) {
        *self = Self {
            state: ContextState::Enabling,
            context_id: Some(context_id),
            call_id: None,
            settings: None,
        };
    }

    pub(super) fn set_active(&mut self, call_id: i32, settings: Ipv4Settings) {
        self.state = ContextState::Active;
        self.call_id = Some(call_id);
        self.settings = Some(settings);
    }

    pub(super) fn refresh(&mut self, settings: Ipv4Settings) {
        if self.state == ContextState::Active {
            self.settings = Some(settings);
        }
    }

    pub(super) fn begin_disabling(&mut self) {
        self.state = ContextState::Disabling;
    }
}
