// Authenticated session over a `MessagingApi`. The session is a scoped
// resource: it disconnects exactly once when dropped, and every transient
// contact it imports is deleted before `probe` returns.

use crate::api::{MessagingApi, RawUser, RpcError};
use crate::error::{Result, TelegrabError};
use crate::phone::PhoneNumber;
use crate::profile::ExtendedProfile;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sign-in attempts allowed for a mistyped or expired verification code.
pub const MAX_CODE_ATTEMPTS: u32 = 3;

/// Result of a single probe attempt. Rate limiting is a value here, not an
/// error, so the controller can match on it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeSignal {
    Found(RawUser),
    NotFound,
    RateLimited { wait: Duration },
    InvalidNumber,
    Failed(String),
}

impl From<RpcError> for ProbeSignal {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::FloodWait { seconds } => ProbeSignal::RateLimited {
                wait: Duration::from_secs(seconds),
            },
            RpcError::PhoneNumberInvalid => ProbeSignal::InvalidNumber,
            other => ProbeSignal::Failed(other.to_string()),
        }
    }
}

/// What the controller needs from an authenticated session.
pub trait ProbeClient {
    fn probe(&self, number: &PhoneNumber) -> ProbeSignal;
    fn fetch_extended_profile(&self, user_id: i64) -> std::result::Result<ExtendedProfile, RpcError>;
}

pub struct Session<A: MessagingApi> {
    api: A,
}

impl<A: MessagingApi> Session<A> {
    /// Check the persisted session and sign in when it is not authorized.
    /// `read_code` is asked for the verification code, again after each
    /// rejected code, up to `MAX_CODE_ATTEMPTS` times. Any failure drops
    /// the half-open session, which disconnects.
    pub fn open<F>(api: A, phone: &str, mut read_code: F) -> Result<Self>
    where
        F: FnMut() -> anyhow::Result<String>,
    {
        let mut session = Session { api };
        let authorized = session
            .api
            .is_authorized()
            .map_err(|e| TelegrabError::Authentication(e.to_string()))?;
        if authorized {
            debug!("session already authorized");
            return Ok(session);
        }

        let sent = session
            .api
            .send_code(phone)
            .map_err(|e| TelegrabError::Authentication(e.to_string()))?;
        info!("verification code sent to the operator's account");

        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = read_code().map_err(|e| TelegrabError::Authentication(e.to_string()))?;
            match session.api.sign_in(phone, &sent.phone_code_hash, code.trim()) {
                Ok(()) => break,
                Err(RpcError::CodeInvalid(reason)) if attempt < MAX_CODE_ATTEMPTS => {
                    warn!(attempt, %reason, "verification code rejected");
                }
                Err(e) => return Err(TelegrabError::Authentication(e.to_string())),
            }
        }
        info!("signed in");
        Ok(session)
    }
}

impl<A: MessagingApi> ProbeClient for Session<A> {
    fn probe(&self, number: &PhoneNumber) -> ProbeSignal {
        let users = match self.api.import_contact(number) {
            Ok(users) => users,
            Err(e) => return e.into(),
        };
        let Some(imported) = users.into_iter().next() else {
            return ProbeSignal::NotFound;
        };
        let _contact = TransientContact {
            api: &self.api,
            user_id: imported.id,
        };

        // Resolving by phone can expose a username the import hid. Only a
        // rate limit is worth reporting from here.
        match self.api.resolve_phone(number) {
            Ok(resolved) => {
                let user = resolved
                    .into_iter()
                    .find(|u| u.id == imported.id)
                    .unwrap_or(imported);
                ProbeSignal::Found(user)
            }
            Err(RpcError::FloodWait { seconds }) => ProbeSignal::RateLimited {
                wait: Duration::from_secs(seconds),
            },
            Err(e) => {
                debug!(%number, error = %e, "could not resolve phone");
                ProbeSignal::Found(imported)
            }
        }
    }

    fn fetch_extended_profile(&self, user_id: i64) -> std::result::Result<ExtendedProfile, RpcError> {
        let full = self.api.get_full_user(user_id)?;
        debug!(user_id, ?full, "full user");
        Ok(ExtendedProfile::from_full_user(user_id, full))
    }
}

impl<A: MessagingApi> Drop for Session<A> {
    fn drop(&mut self) {
        match self.api.disconnect() {
            Ok(()) => debug!("disconnected"),
            Err(e) => warn!(error = %e, "disconnect failed"),
        }
    }
}

/// A contact imported only to trigger resolution; deleted on drop.
struct TransientContact<'a, A: MessagingApi> {
    api: &'a A,
    user_id: i64,
}

impl<A: MessagingApi> Drop for TransientContact<'_, A> {
    fn drop(&mut self) {
        if let Err(e) = self.api.delete_contact(self.user_id) {
            warn!(user_id = self.user_id, error = %e, "could not delete transient contact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FullUser, SentCode, UserFull};
    use crate::phone::normalize;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeApi {
        authorized: bool,
        authorized_error: Option<RpcError>,
        send_code_error: Option<RpcError>,
        sign_in_results: RefCell<VecDeque<std::result::Result<(), RpcError>>>,
        import: RefCell<VecDeque<std::result::Result<Vec<RawUser>, RpcError>>>,
        resolve: RefCell<VecDeque<std::result::Result<Vec<RawUser>, RpcError>>>,
        deleted: RefCell<Vec<i64>>,
        disconnects: Cell<u32>,
    }

    fn user(id: i64, username: Option<&str>) -> RawUser {
        RawUser {
            id,
            first_name: Some("Test".into()),
            last_name: None,
            username: username.map(String::from),
            bot: false,
            status: None,
        }
    }

    impl MessagingApi for &FakeApi {
        fn is_authorized(&self) -> std::result::Result<bool, RpcError> {
            match &self.authorized_error {
                Some(e) => Err(e.clone()),
                None => Ok(self.authorized),
            }
        }
        fn send_code(&self, _phone: &str) -> std::result::Result<SentCode, RpcError> {
            if let Some(e) = &self.send_code_error {
                return Err(e.clone());
            }
            Ok(SentCode {
                phone_code_hash: "hash".into(),
            })
        }
        fn sign_in(&mut self, _: &str, _: &str, _: &str) -> std::result::Result<(), RpcError> {
            self.sign_in_results.borrow_mut().pop_front().unwrap_or(Ok(()))
        }
        fn import_contact(&self, _: &PhoneNumber) -> std::result::Result<Vec<RawUser>, RpcError> {
            self.import.borrow_mut().pop_front().unwrap_or(Ok(vec![]))
        }
        fn resolve_phone(&self, _: &PhoneNumber) -> std::result::Result<Vec<RawUser>, RpcError> {
            self.resolve.borrow_mut().pop_front().unwrap_or(Ok(vec![]))
        }
        fn get_full_user(&self, _: i64) -> std::result::Result<FullUser, RpcError> {
            Ok(FullUser {
                full_user: UserFull::default(),
                users: vec![],
            })
        }
        fn delete_contact(&self, user_id: i64) -> std::result::Result<(), RpcError> {
            self.deleted.borrow_mut().push(user_id);
            Ok(())
        }
        fn disconnect(&self) -> std::result::Result<(), RpcError> {
            self.disconnects.set(self.disconnects.get() + 1);
            Ok(())
        }
    }

    fn authorized() -> FakeApi {
        FakeApi {
            authorized: true,
            ..FakeApi::default()
        }
    }

    fn no_code() -> anyhow::Result<String> {
        anyhow::bail!("no prompt expected")
    }

    #[test]
    fn found_user_prefers_resolved_data_and_deletes_contact() {
        let fake = authorized();
        fake.import.borrow_mut().push_back(Ok(vec![user(5, None)]));
        fake.resolve.borrow_mut().push_back(Ok(vec![user(5, Some("neo"))]));
        let session = Session::open(&fake, "1", no_code).unwrap();

        let signal = session.probe(&normalize("15550000001").unwrap());
        assert_eq!(signal, ProbeSignal::Found(user(5, Some("neo"))));
        assert_eq!(*fake.deleted.borrow(), vec![5]);
    }

    #[test]
    fn not_found_creates_nothing_to_delete() {
        let fake = authorized();
        let session = Session::open(&fake, "1", no_code).unwrap();
        assert_eq!(
            session.probe(&normalize("15550000001").unwrap()),
            ProbeSignal::NotFound
        );
        assert!(fake.deleted.borrow().is_empty());
    }

    #[test]
    fn rate_limit_after_import_still_deletes_contact() {
        let fake = authorized();
        fake.import.borrow_mut().push_back(Ok(vec![user(9, None)]));
        fake.resolve
            .borrow_mut()
            .push_back(Err(RpcError::FloodWait { seconds: 30 }));
        let session = Session::open(&fake, "1", no_code).unwrap();

        assert_eq!(
            session.probe(&normalize("15550000001").unwrap()),
            ProbeSignal::RateLimited {
                wait: Duration::from_secs(30)
            }
        );
        assert_eq!(*fake.deleted.borrow(), vec![9]);
    }

    #[test]
    fn import_errors_become_signals() {
        let fake = authorized();
        fake.import
            .borrow_mut()
            .push_back(Err(RpcError::PhoneNumberInvalid));
        fake.import.borrow_mut().push_back(Err(RpcError::Rpc {
            code: 500,
            message: "INTERNAL".into(),
        }));
        let session = Session::open(&fake, "1", no_code).unwrap();
        let number = normalize("15550000001").unwrap();
        assert_eq!(session.probe(&number), ProbeSignal::InvalidNumber);
        assert!(matches!(session.probe(&number), ProbeSignal::Failed(m) if m.contains("INTERNAL")));
    }

    #[test]
    fn drop_disconnects_exactly_once() {
        let fake = authorized();
        {
            let _session = Session::open(&fake, "1", no_code).unwrap();
        }
        assert_eq!(fake.disconnects.get(), 1);
    }

    #[test]
    fn rejected_code_is_asked_again() {
        let fake = FakeApi::default();
        fake.sign_in_results
            .borrow_mut()
            .push_back(Err(RpcError::CodeInvalid("PHONE_CODE_INVALID".into())));
        let prompts = Cell::new(0);
        let session = Session::open(&fake, "1", || {
            prompts.set(prompts.get() + 1);
            Ok("12345".to_string())
        });
        assert!(session.is_ok());
        assert_eq!(prompts.get(), 2);
    }

    #[test]
    fn gives_up_after_repeated_bad_codes() {
        let fake = FakeApi::default();
        for _ in 0..MAX_CODE_ATTEMPTS {
            fake.sign_in_results
                .borrow_mut()
                .push_back(Err(RpcError::CodeInvalid("PHONE_CODE_INVALID".into())));
        }
        let err = Session::open(&fake, "1", || Ok("0".to_string())).err().unwrap();
        assert!(matches!(err, TelegrabError::Authentication(_)));
        assert_eq!(fake.disconnects.get(), 1);
    }

    #[test]
    fn failed_authorization_check_disconnects() {
        let fake = FakeApi {
            authorized_error: Some(RpcError::Transport("refused".into())),
            ..FakeApi::default()
        };
        let err = Session::open(&fake, "1", no_code).err().unwrap();
        assert!(matches!(err, TelegrabError::Authentication(m) if m.contains("refused")));
        assert_eq!(fake.disconnects.get(), 1);
    }

    #[test]
    fn failed_send_code_disconnects() {
        let fake = FakeApi {
            send_code_error: Some(RpcError::FloodWait { seconds: 60 }),
            ..FakeApi::default()
        };
        let err = Session::open(&fake, "1", no_code).err().unwrap();
        assert!(matches!(err, TelegrabError::Authentication(_)));
        assert_eq!(fake.disconnects.get(), 1);
    }

    #[test]
    fn aborted_code_prompt_disconnects() {
        let fake = FakeApi::default();
        let err = Session::open(&fake, "1", no_code).err().unwrap();
        assert!(matches!(err, TelegrabError::Authentication(m) if m.contains("no prompt expected")));
        assert_eq!(fake.disconnects.get(), 1);
        assert!(fake.sign_in_results.borrow().is_empty());
    }
}
