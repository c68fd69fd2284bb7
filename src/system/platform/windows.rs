use super::PlatformExtensions;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn release_free_memory() -> bool {
        false
    }
}
