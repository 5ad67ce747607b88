use camino::{Utf8Path, Utf8PathBuf};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};
use tracing::{debug, info, warn};

use crate::cache::write_file_atomic;
use crate::config::Settings;
use crate::error::WetterfeeError;

/// Primitive operations against the remote archive.
///
/// `retrieve` must report a missing file as [`WetterfeeError::NotFound`] so that
/// [`complete_filename`] can recover from it.
pub trait RemoteSession {
    fn list(&mut self, path: Option<&str>) -> Result<Vec<String>, WetterfeeError>;
    fn change_directory(&mut self, path: &str) -> Result<(), WetterfeeError>;
    fn retrieve(&mut self, filename: &str) -> Result<Vec<u8>, WetterfeeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Latin1,
    Utf8,
}

impl TextEncoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Latin1 => bytes.iter().map(|&byte| char::from(byte)).collect(),
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

pub struct FtpSession {
    address: String,
    initial_dir: Option<String>,
    stream: Option<FtpStream>,
}

impl FtpSession {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            initial_dir: None,
            stream: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.host.clone()).with_initial_dir(settings.remote_dir())
    }

    pub fn with_initial_dir(mut self, dir: impl Into<String>) -> Self {
        self.initial_dir = Some(dir.into());
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> Result<&mut FtpStream, WetterfeeError> {
        if self.stream.is_none() {
            let stream = self.connect()?;
            self.stream = Some(stream);
        }
        self.stream.as_mut().ok_or_else(|| WetterfeeError::Connection {
            address: self.address.clone(),
            message: "session not established".to_string(),
        })
    }

    fn connect(&self) -> Result<FtpStream, WetterfeeError> {
        info!(address = %self.address, "connecting to archive");
        let mut stream = FtpStream::connect(self.address.as_str())
            .map_err(|err| self.connection_error(err))?;
        stream
            .login("anonymous", "anonymous")
            .map_err(|err| self.connection_error(err))?;
        if let Some(welcome) = stream.get_welcome_msg() {
            debug!("{}", welcome.trim());
        }
        stream
            .transfer_type(FileType::Binary)
            .map_err(|err| WetterfeeError::Ftp(err.to_string()))?;
        if let Some(dir) = &self.initial_dir {
            debug!(dir = %dir, "changing to archive directory");
            stream
                .cwd(dir)
                .map_err(|err| self.map_error(err, || WetterfeeError::Path(dir.clone())))?;
        }
        Ok(stream)
    }

    fn connection_error(&self, err: FtpError) -> WetterfeeError {
        WetterfeeError::Connection {
            address: self.address.clone(),
            message: err.to_string(),
        }
    }

    fn map_error<F>(&self, err: FtpError, unavailable: F) -> WetterfeeError
    where
        F: FnOnce() -> WetterfeeError,
    {
        match err {
            FtpError::UnexpectedResponse(ref response)
                if matches!(response.status, Status::FileUnavailable) =>
            {
                unavailable()
            }
            FtpError::ConnectionError(_) => self.connection_error(err),
            other => WetterfeeError::Ftp(other.to_string()),
        }
    }
}

impl RemoteSession for FtpSession {
    fn list(&mut self, path: Option<&str>) -> Result<Vec<String>, WetterfeeError> {
        debug!(path = path.unwrap_or("."), "LIST");
        let result = self.stream()?.list(path);
        result.map_err(|err| {
            self.map_error(err, || WetterfeeError::Path(path.unwrap_or(".").to_string()))
        })
    }

    fn change_directory(&mut self, path: &str) -> Result<(), WetterfeeError> {
        debug!(path, "CWD");
        let result = self.stream()?.cwd(path);
        result.map_err(|err| self.map_error(err, || WetterfeeError::Path(path.to_string())))
    }

    fn retrieve(&mut self, filename: &str) -> Result<Vec<u8>, WetterfeeError> {
        debug!(filename, "RETR");
        let result = self.stream()?.retr_as_buffer(filename);
        result
            .map(|cursor| cursor.into_inner())
            .map_err(|err| self.map_error(err, || WetterfeeError::NotFound(filename.to_string())))
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!(address = %self.address, "terminating FTP session");
            if let Err(err) = stream.quit() {
                warn!("failed to quit FTP session gracefully: {err}");
            }
        }
    }
}

/// Runs `op` with `filename`; if the file is not there, retries once with the
/// only non-directory entry of the current remote directory that starts with
/// `filename`.
pub fn complete_filename<S, T, F>(
    session: &mut S,
    filename: &str,
    mut op: F,
) -> Result<T, WetterfeeError>
where
    S: RemoteSession + ?Sized,
    F: FnMut(&mut S, &str) -> Result<T, WetterfeeError>,
{
    match op(session, filename) {
        Err(err) if err.is_not_found() => {
            debug!(filename, "exact name not found, trying completion");
            let listing = session.list(None)?;
            let mut candidates = completion_candidates(&listing, filename);
            if candidates.len() == 1 {
                let completed = candidates.remove(0);
                info!(requested = filename, completed = %completed, "completed file name");
                op(session, &completed)
            } else {
                Err(WetterfeeError::AmbiguousOrMissingFile {
                    requested: filename.to_string(),
                    candidates,
                })
            }
        }
        other => other,
    }
}

pub fn completion_candidates(listing: &[String], prefix: &str) -> Vec<String> {
    let mut candidates = listing
        .iter()
        .filter(|line| !line.starts_with('d'))
        .filter_map(|line| line.split_whitespace().last())
        .filter(|name| name.starts_with(prefix))
        .map(str::to_string)
        .collect::<Vec<_>>();
    candidates.sort();
    candidates.dedup();
    candidates
}

pub struct ArchiveBrowser<S: RemoteSession> {
    session: S,
}

impl<S: RemoteSession> ArchiveBrowser<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn list(&mut self, path: Option<&str>) -> Result<Vec<String>, WetterfeeError> {
        self.session.list(path)
    }

    pub fn change_directory(&mut self, path: &str) -> Result<&mut Self, WetterfeeError> {
        self.session.change_directory(path)?;
        Ok(self)
    }

    pub fn read(
        &mut self,
        filename: &str,
        encoding: TextEncoding,
    ) -> Result<String, WetterfeeError> {
        complete_filename(&mut self.session, filename, |session, name| {
            let bytes = session.retrieve(name)?;
            Ok(encoding.decode(&bytes))
        })
    }

    pub fn download(
        &mut self,
        filename: &str,
        dest_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, WetterfeeError> {
        complete_filename(&mut self.session, filename, |session, name| {
            let bytes = session.retrieve(name)?;
            let local_name = Utf8Path::new(name).file_name().unwrap_or(name);
            let destination = dest_dir.join(local_name);
            write_file_atomic(&destination, &bytes)?;
            info!(file = %destination, bytes = bytes.len(), "downloaded");
            Ok(destination)
        })
    }
}
