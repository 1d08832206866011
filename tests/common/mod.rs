use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use telegrab::api::{FullUser, MessagingApi, RawUser, RpcError, SentCode, UserFull, UserStatus};
use telegrab::controller::{Sleeper, StopFlag};
use telegrab::phone::PhoneNumber;

/// What the fake platform does when a number is imported.
#[derive(Clone)]
pub enum Script {
    /// The account exists; import and resolution both return it.
    Registered(RawUser),
    /// No account for the number.
    Unknown,
    /// The contact is created, then resolution is rate limited.
    FloodAfterImport { user_id: i64, seconds: u64 },
    /// Import itself fails.
    ImportError(RpcError),
}

/// A scripted stand-in for the messaging gateway that records every call
/// the prober makes.
#[derive(Default)]
pub struct FakeGateway {
    pub scripts: HashMap<String, Script>,
    pub imports: RefCell<Vec<String>>,
    pub deleted: RefCell<Vec<i64>>,
    pub full_user_requests: RefCell<Vec<i64>>,
    pub disconnects: Cell<u32>,
    pending: RefCell<VecDeque<Script>>,
}

impl FakeGateway {
    pub fn with(scripts: &[(&str, Script)]) -> Self {
        FakeGateway {
            scripts: scripts
                .iter()
                .map(|(n, s)| (n.to_string(), s.clone()))
                .collect(),
            ..FakeGateway::default()
        }
    }
}

pub fn user(id: i64, first_name: &str, username: Option<&str>) -> RawUser {
    RawUser {
        id,
        first_name: Some(first_name.to_string()),
        last_name: None,
        username: username.map(String::from),
        bot: false,
        status: Some(UserStatus::Recently {}),
    }
}

impl MessagingApi for &FakeGateway {
    fn is_authorized(&self) -> Result<bool, RpcError> {
        Ok(true)
    }

    fn send_code(&self, _phone: &str) -> Result<SentCode, RpcError> {
        Err(RpcError::Rpc {
            code: 500,
            message: "not expected".into(),
        })
    }

    fn sign_in(&mut self, _: &str, _: &str, _: &str) -> Result<(), RpcError> {
        Ok(())
    }

    fn import_contact(&self, phone: &PhoneNumber) -> Result<Vec<RawUser>, RpcError> {
        self.imports.borrow_mut().push(phone.to_string());
        let script = self
            .scripts
            .get(phone.as_str())
            .cloned()
            .unwrap_or(Script::Unknown);
        let result = match &script {
            Script::Registered(u) => Ok(vec![u.clone()]),
            Script::Unknown => Ok(vec![]),
            Script::FloodAfterImport { user_id, .. } => Ok(vec![user(*user_id, "", None)]),
            Script::ImportError(e) => Err(e.clone()),
        };
        if matches!(&result, Ok(users) if !users.is_empty()) {
            self.pending.borrow_mut().push_back(script);
        }
        result
    }

    fn resolve_phone(&self, _phone: &PhoneNumber) -> Result<Vec<RawUser>, RpcError> {
        match self.pending.borrow_mut().pop_front() {
            Some(Script::Registered(u)) => Ok(vec![u]),
            Some(Script::FloodAfterImport { seconds, .. }) => Err(RpcError::FloodWait { seconds }),
            _ => Ok(vec![]),
        }
    }

    fn get_full_user(&self, user_id: i64) -> Result<FullUser, RpcError> {
        self.full_user_requests.borrow_mut().push(user_id);
        Ok(FullUser {
            full_user: UserFull {
                about: Some("just probing".into()),
            },
            users: vec![],
        })
    }

    fn delete_contact(&self, user_id: i64) -> Result<(), RpcError> {
        self.deleted.borrow_mut().push(user_id);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), RpcError> {
        self.disconnects.set(self.disconnects.get() + 1);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSleeper(pub RefCell<Vec<Duration>>);

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

/// Records like `RecordingSleeper`, and sets the stop flag on the first
/// sleep, as a Ctrl-C during the pause would.
pub struct StoppingSleeper {
    stop: StopFlag,
    pub slept: RefCell<Vec<Duration>>,
}

impl StoppingSleeper {
    pub fn new(stop: StopFlag) -> Self {
        StoppingSleeper {
            stop,
            slept: RefCell::default(),
        }
    }
}

impl Sleeper for StoppingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
        self.stop.stop();
    }
}
