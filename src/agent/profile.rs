//! Specialist profiles: fixed behavioral configurations.
//!
//! Three specialists exist. Each is a system instruction plus an allowed
//! tool subset; the Analyst's set excludes every mutating tool, and that
//! exclusion is enforced at dispatch time, not by the instruction text.

use crate::tools::builtin::{FINISH_TASK, LOG_THOUGHT};

/// The three fixed specialists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specialist {
    Coder,
    Bugfixer,
    Analyst,
}

impl Specialist {
    pub fn name(&self) -> &'static str {
        match self {
            Specialist::Coder => "coder",
            Specialist::Bugfixer => "bugfixer",
            Specialist::Analyst => "analyst",
        }
    }
}

impl std::fmt::Display for Specialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A specialist's full behavioral configuration.
#[derive(Debug, Clone, Copy)]
pub struct SpecialistProfile {
    pub specialist: Specialist,
    pub instructions: &'static str,
    pub allowed_tools: &'static [&'static str],
}

static CODER_TOOLS: [&str; 12] = [
    "list_files",
    "read_file",
    "git_status",
    "git_diff",
    "git_log",
    "write_file",
    "git_create_branch",
    "git_add",
    "git_commit",
    "git_push",
    LOG_THOUGHT,
    FINISH_TASK,
];

static ANALYST_TOOLS: [&str; 7] = [
    "list_files",
    "read_file",
    "git_status",
    "git_diff",
    "git_log",
    LOG_THOUGHT,
    FINISH_TASK,
];

const CODER_INSTRUCTIONS: &str = "\
You are an expert autonomous agent. Your goal is to solve the ticket \
efficiently using the provided TOOLS.

RULES:
1. Do NOT chat. Use 'log_thought' to explain your thinking.
2. If you write code, you MUST save it ('write_file').
3. 'git_push' is MANDATORY before 'finish_task'.
4. Always end with 'finish_task' and a summary of your changes.

ROLE: CODER (feature implementation)

CHECKLIST:
1. [ ] Analyze (list_files/read_file).
2. [ ] Plan (log_thought).
3. [ ] BRANCH: call 'git_create_branch'.
4. [ ] IMPLEMENT (write_file).
5. [ ] Save (git_add ['.'] -> git_commit -> git_push).
6. [ ] DONE: finish_task.";

const BUGFIXER_INSTRUCTIONS: &str = "\
You are an expert autonomous agent. Your goal is to solve the ticket \
efficiently using the provided TOOLS.

RULES:
1. Do NOT chat. Use 'log_thought' to explain your thinking.
2. If you write code, you MUST save it ('write_file').
3. 'git_push' is MANDATORY before 'finish_task'.
4. Always end with 'finish_task' and a summary of your changes.

ROLE: BUGFIXER (error correction)

CHECKLIST:
1. [ ] Read the failing files (read_file).
2. [ ] Plan the fix (log_thought).
3. [ ] BRANCH: call 'git_create_branch'.
4. [ ] Apply the fix (write_file).
5. [ ] Save (git_add -> git_commit -> git_push).
6. [ ] DONE: finish_task.";

const ANALYST_INSTRUCTIONS: &str = "\
You are a code consultant: the reader. Your goal is to answer the ticket's \
question based on the repository content. You cannot modify anything.

WORKFLOW:
1. Explore (list_files).
2. Read (read_file, git_log, git_diff).
3. Think (log_thought).
4. Deliver the answer as the summary of 'finish_task'.";

static CODER_PROFILE: SpecialistProfile = SpecialistProfile {
    specialist: Specialist::Coder,
    instructions: CODER_INSTRUCTIONS,
    allowed_tools: &CODER_TOOLS,
};

static BUGFIXER_PROFILE: SpecialistProfile = SpecialistProfile {
    specialist: Specialist::Bugfixer,
    instructions: BUGFIXER_INSTRUCTIONS,
    allowed_tools: &CODER_TOOLS,
};

static ANALYST_PROFILE: SpecialistProfile = SpecialistProfile {
    specialist: Specialist::Analyst,
    instructions: ANALYST_INSTRUCTIONS,
    allowed_tools: &ANALYST_TOOLS,
};

/// Look up the static profile for a specialist.
pub fn profile_for(specialist: Specialist) -> &'static SpecialistProfile {
    match specialist {
        Specialist::Coder => &CODER_PROFILE,
        Specialist::Bugfixer => &BUGFIXER_PROFILE,
        Specialist::Analyst => &ANALYST_PROFILE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ_TOOLS: [&str; 5] =
        ["list_files", "read_file", "git_status", "git_diff", "git_log"];

    const BASE_TOOLS: [&str; 2] = [LOG_THOUGHT, FINISH_TASK];

    const MUTATING_TOOLS: [&str; 5] = [
        "write_file",
        "git_add",
        "git_commit",
        "git_create_branch",
        "git_push",
    ];

    #[test]
    fn analyst_excludes_mutating_tools() {
        let profile = profile_for(Specialist::Analyst);
        for tool in MUTATING_TOOLS {
            assert!(
                !profile.allowed_tools.contains(&tool),
                "analyst must not reach {}",
                tool
            );
        }
    }

    #[test]
    fn every_profile_can_finish_and_think() {
        for specialist in [Specialist::Coder, Specialist::Bugfixer, Specialist::Analyst] {
            let profile = profile_for(specialist);
            for tool in BASE_TOOLS {
                assert!(profile.allowed_tools.contains(&tool));
            }
        }
    }

    #[test]
    fn every_profile_can_read() {
        for specialist in [Specialist::Coder, Specialist::Bugfixer, Specialist::Analyst] {
            let profile = profile_for(specialist);
            for tool in READ_TOOLS {
                assert!(profile.allowed_tools.contains(&tool));
            }
        }
    }

    #[test]
    fn mutating_profiles_forbid_chatting() {
        assert!(profile_for(Specialist::Coder).instructions.contains("Do NOT chat"));
        assert!(profile_for(Specialist::Bugfixer).instructions.contains("Do NOT chat"));
    }
}
