use crate::infrastructure::database::Database;
use crate::modules::audit::AuditSink;
use tessera::prelude::*;

#[derive(Injectable)]
pub struct UserService {
    database: Arc<Database>,
    audit: Arc<AuditSink>,
    // the directory depends on this service as well
    directory: Lazy<UserDirectory>,
}

impl UserService {
    pub fn create(&self, name: &str) -> u64 {
        let id = self.database.insert(name.to_string());
        self.audit.record(format!("user {} created as #{}", name, id));
        id
    }

    pub fn find(&self, id: u64) -> Option<String> {
        self.database.find(id)
    }

    pub fn directory(&self) -> Result<Arc<UserDirectory>> {
        self.directory.get()
    }
}

#[derive(Injectable)]
pub struct UserDirectory {
    users: Lazy<UserService>,
}

impl UserDirectory {
    /// Creates the default accounts, returns how many were added.
    pub fn seed(&self) -> usize {
        let Ok(users) = self.users.get() else {
            return 0;
        };
        ["admin", "guest"].iter().map(|name| users.create(name)).count()
    }

    pub fn listing(&self, ids: &[u64]) -> Vec<String> {
        let Ok(users) = self.users.get() else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| users.find(*id)).collect()
    }
}
