//! Secret generation from the kernel random devices
//!
//! Waits until the blocking pool reports readable entropy, then reads the
//! secret from the non-blocking device. This keeps secrets generated early
//! in boot from coming out of an unseeded pool.

use super::CookieError;
use log::debug;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::ptr;
use std::time::{Duration, Instant};

/// Default bound on the entropy wait
pub const DEFAULT_ENTROPY_TIMEOUT: Duration = Duration::from_secs(30);

/// Where secret bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntropySource {
    /// Device polled for readiness
    pub random_device: PathBuf,
    /// Device the secret bytes are read from
    pub urandom_device: PathBuf,
    /// How long to wait for readiness
    pub timeout: Duration,
}

impl Default for EntropySource {
    fn default() -> Self {
        Self {
            random_device: PathBuf::from("/dev/random"),
            urandom_device: PathBuf::from("/dev/urandom"),
            timeout: DEFAULT_ENTROPY_TIMEOUT,
        }
    }
}

impl EntropySource {
    /// Block until entropy is available, then return `len` random bytes.
    pub fn fill(&self, len: usize) -> Result<Vec<u8>, CookieError> {
        self.wait_for_entropy()?;

        let mut file = File::open(&self.urandom_device)
            .map_err(|e| source_error(&self.urandom_device, e))?;
        let mut secret = vec![0u8; len];
        file.read_exact(&mut secret)
            .map_err(|e| source_error(&self.urandom_device, e))?;

        Ok(secret)
    }

    fn wait_for_entropy(&self) -> Result<(), CookieError> {
        let random = File::open(&self.random_device)
            .map_err(|e| source_error(&self.random_device, e))?;
        let fd = random.as_raw_fd();
        check_selectable(fd).map_err(|e| source_error(&self.random_device, e))?;

        debug!(
            "🎲 Waiting up to {:?} for entropy on {}",
            self.timeout,
            self.random_device.display()
        );

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());

            // SAFETY: fd_set is plain data; FD_ZERO/FD_SET only touch the set,
            // and `fd` stays open for the duration of the call via `random`.
            let mut readable: libc::fd_set = unsafe { std::mem::zeroed() };
            unsafe {
                libc::FD_ZERO(&mut readable);
                libc::FD_SET(fd, &mut readable);
            }
            let mut tv = libc::timeval {
                tv_sec: remaining.as_secs() as libc::time_t,
                tv_usec: remaining.subsec_micros() as libc::suseconds_t,
            };

            // SAFETY: all pointers refer to live stack values or are null.
            let rc = unsafe {
                libc::select(
                    fd + 1,
                    &mut readable,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    &mut tv,
                )
            };

            match rc {
                0 => return Err(CookieError::EntropyTimeout(self.timeout)),
                n if n > 0 => {
                    debug!("🎲 Entropy available on {}", self.random_device.display());
                    return Ok(());
                }
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(source_error(&self.random_device, err));
                }
            }
        }
    }
}

/// `select(2)` can only watch descriptors below `FD_SETSIZE`.
fn check_selectable(fd: RawFd) -> io::Result<()> {
    if fd < 0 || fd as usize >= libc::FD_SETSIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("descriptor {} is outside the select(2) range", fd),
        ));
    }
    Ok(())
}

fn source_error(path: &Path, source: io::Error) -> CookieError {
    CookieError::EntropySource {
        path: path.to_path_buf(),
        source,
    }
}
