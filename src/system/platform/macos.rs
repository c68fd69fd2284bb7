use super::PlatformExtensions;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn release_free_memory() -> bool {
        // libmalloc returns pages on its own; there is no trim entry point
        false
    }
}
