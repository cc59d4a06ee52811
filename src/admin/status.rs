/// Role of a member as reported by the status query. Codes are the engine's `state` numbers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemberRole {
    Primary,
    Secondary,
    Arbiter,
    Other(i32),
}

impl MemberRole {
    pub fn from_state_code(code: i32) -> Self {
        match code {
            1 => MemberRole::Primary,
            2 => MemberRole::Secondary,
            7 => MemberRole::Arbiter,
            other => MemberRole::Other(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberStatus {
    // host:port, as the engine names the member.
    pub name: String,
    pub role: MemberRole,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplSetStatus {
    pub set_name: String,
    pub members: Vec<MemberStatus>,
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Convergence {
    Converged,
    Pending(String),
}

impl ReplSetStatus {
    pub fn primary(&self) -> Option<&MemberStatus> {
        self.members.iter().find(|m| m.role == MemberRole::Primary)
    }

    /// Converged means every expected member is listed, exactly one is primary, and every other
    /// one is a secondary or an arbiter.
    pub(crate) fn convergence(&self, expected_members: usize) -> Convergence {
        if self.members.len() < expected_members {
            return Convergence::Pending(format!(
                "{} of {} members listed",
                self.members.len(),
                expected_members
            ));
        }

        let primaries = self.members.iter().filter(|m| m.role == MemberRole::Primary).count();
        if primaries != 1 {
            return Convergence::Pending(format!("{} primaries", primaries));
        }

        let unsettled: Vec<String> = self
            .members
            .iter()
            .filter_map(|m| match m.role {
                MemberRole::Other(code) => Some(format!("{} in state {}", m.name, code)),
                _ => None,
            })
            .collect();
        if !unsettled.is_empty() {
            return Convergence::Pending(unsettled.join(", "));
        }

        Convergence::Converged
    }
}
