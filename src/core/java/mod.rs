pub mod runtime;

pub use runtime::{
    required_java_for_minecraft_version, Platform, RuntimeArch, RuntimeOs, RuntimeProvisioner,
};
