use super::PlatformExtensions;

pub struct Platform;

impl PlatformExtensions for Platform {
    #[cfg(target_env = "gnu")]
    fn release_free_memory() -> bool {
        // glibc keeps freed arenas mapped until trimmed
        unsafe { libc::malloc_trim(0) == 1 }
    }

    #[cfg(not(target_env = "gnu"))]
    fn release_free_memory() -> bool {
        false
    }
}
