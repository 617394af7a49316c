//! Execution order of every stage.
//!
//! Lower runs first. Groups leave gaps so stages can be slotted in without
//! renumbering. Init/update stages use 10-899, upgrade stages reuse the
//! low range (they never share a pipeline with init stages), and removal
//! stages sit at 1000 and above.

// Setup
pub const VALIDATE_ENVIRONMENT: u32 = 10;
pub const CREATE_OAK_DIR: u32 = 20;

// Config
pub const LOAD_EXISTING_CONFIG: u32 = 100;
pub const CREATE_CONFIG: u32 = 110;
pub const UPDATE_CONFIG_AGENTS: u32 = 120;
pub const UPDATE_CONFIG_IDES: u32 = 130;
pub const MARK_MIGRATIONS_COMPLETE: u32 = 160;

// Agents. Skill cleanup for removed agents runs just before their commands go.
pub const INSTALL_AGENT_COMMANDS: u32 = 220;
pub const CLEANUP_AGENT_SKILLS: u32 = 229;
pub const REMOVE_AGENT_COMMANDS: u32 = 230;

// Features
pub const RESOLVE_DEPENDENCIES: u32 = 300;
pub const REMOVE_FEATURES: u32 = 310;
pub const INSTALL_FEATURES: u32 = 320;

// IDE
pub const INSTALL_CORE_IDE_ASSETS: u32 = 400;
pub const REMOVE_IDE_SETTINGS: u32 = 410;
pub const INSTALL_IDE_SETTINGS: u32 = 420;

// Skills
pub const INSTALL_SKILLS: u32 = 500;
pub const REFRESH_SKILLS: u32 = 510;

// Hooks
pub const TRIGGER_AGENTS_CHANGED: u32 = 600;
pub const TRIGGER_IDES_CHANGED: u32 = 610;
pub const TRIGGER_INIT_COMPLETE: u32 = 650;

// Finalization
pub const UPDATE_VERSION: u32 = 800;
pub const ENSURE_GITIGNORE: u32 = 810;

// Upgrade
pub const VALIDATE_UPGRADE_ENVIRONMENT: u32 = 10;
pub const PLAN_UPGRADE: u32 = 50;
pub const TRIGGER_PRE_UPGRADE_HOOKS: u32 = 100;
pub const UPGRADE_STRUCTURAL_REPAIRS: u32 = 150;
pub const UPGRADE_COMMANDS: u32 = 200;
pub const UPGRADE_IDE_SETTINGS: u32 = 230;
pub const UPGRADE_SKILLS: u32 = 240;
pub const RUN_MIGRATIONS: u32 = 250;
pub const UPDATE_UPGRADE_VERSION: u32 = 300;
pub const TRIGGER_POST_UPGRADE_HOOKS: u32 = 350;

// Removal
pub const VALIDATE_REMOVAL: u32 = 1000;
pub const PLAN_REMOVAL: u32 = 1010;
pub const TRIGGER_PRE_REMOVE_HOOKS: u32 = 1020;
pub const REMOVE_SKILLS: u32 = 1030;
pub const REMOVE_CREATED_FILES: u32 = 1040;
pub const REMOVE_IDE_SETTINGS_REMOVAL: u32 = 1050;
pub const CLEANUP_DIRECTORIES: u32 = 1060;
pub const REMOVE_OAK_DIR: u32 = 1070;
