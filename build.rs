fn main() {
    // Exposes `built_info::GIT_COMMIT_HASH` and friends to the crate.
    if let Err(e) = built::write_built_file() {
        panic!("Failed to acquire build-time information: {e}");
    }
}
