pub trait PlatformExtensions {
    /// Ask the allocator to hand free pages back to the OS. Returns whether
    /// anything was released.
    fn release_free_memory() -> bool;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn release_free_memory() -> bool {
    platform_impl::Platform::release_free_memory()
}
