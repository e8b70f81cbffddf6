//! User directory and sensor ownership

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::error::{DirectoryError, DirectoryResult};
use super::ids::IdAllocator;
use super::sensor::{Sensor, SensorDirectory};
use crate::cancel;
use crate::storage::SensorId;

/// Identifier of a user
pub type UserId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// Users and the sensors attached to them
pub struct UserDirectory {
    users: RwLock<HashMap<UserId, User>>,
    /// Ownership kept apart from users so attaching never blocks user lookups
    owners: RwLock<HashMap<UserId, BTreeSet<SensorId>>>,
    sensors: Arc<dyn SensorDirectory>,
    ids: Arc<dyn IdAllocator>,
}

impl UserDirectory {
    pub fn new(sensors: Arc<dyn SensorDirectory>, ids: Arc<dyn IdAllocator>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
            sensors,
            ids,
        }
    }

    /// Register a user under a freshly allocated id
    pub async fn register_user(&self, name: &str, cancel: &CancellationToken) -> DirectoryResult<User> {
        if name.is_empty() {
            return Err(DirectoryError::InvalidUserName);
        }

        let mut users = cancel::race(cancel, self.users.write())
            .await
            .ok_or(DirectoryError::Cancelled)?;

        let user = User {
            id: self.ids.next_id(),
            name: name.to_string(),
        };
        users.insert(user.id, user.clone());

        tracing::info!(user_id = user.id, "Registered user");
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId, cancel: &CancellationToken) -> DirectoryResult<User> {
        let users = cancel::race(cancel, self.users.read())
            .await
            .ok_or(DirectoryError::Cancelled)?;
        users.get(&id).cloned().ok_or(DirectoryError::UserNotFound(id))
    }

    /// Attach a sensor to a user; attaching twice is a no-op
    pub async fn attach_sensor(
        &self,
        user_id: UserId,
        sensor_id: SensorId,
        cancel: &CancellationToken,
    ) -> DirectoryResult<()> {
        self.get_user(user_id, cancel).await?;
        self.sensors.get_by_id(sensor_id, cancel).await?;

        let mut owners = cancel::race(cancel, self.owners.write())
            .await
            .ok_or(DirectoryError::Cancelled)?;
        owners.entry(user_id).or_default().insert(sensor_id);

        tracing::debug!(user_id, sensor_id, "Attached sensor to user");
        Ok(())
    }

    /// Sensors attached to a user, ordered by sensor id
    pub async fn user_sensors(
        &self,
        user_id: UserId,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<Sensor>> {
        self.get_user(user_id, cancel).await?;

        let sensor_ids: Vec<SensorId> = {
            let owners = cancel::race(cancel, self.owners.read())
                .await
                .ok_or(DirectoryError::Cancelled)?;
            owners
                .get(&user_id)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default()
        };

        let mut sensors = Vec::with_capacity(sensor_ids.len());
        for id in sensor_ids {
            sensors.push(self.sensors.get_by_id(id, cancel).await?);
        }
        Ok(sensors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{AtomicIdAllocator, InMemorySensorDirectory, SensorType};

    async fn setup() -> (UserDirectory, Arc<InMemorySensorDirectory>) {
        let sensors = Arc::new(InMemorySensorDirectory::new(Arc::new(AtomicIdAllocator::new())));
        let users = UserDirectory::new(
            Arc::clone(&sensors) as Arc<dyn SensorDirectory>,
            Arc::new(AtomicIdAllocator::new()),
        );
        (users, sensors)
    }

    #[tokio::test]
    async fn test_register_user() {
        let (users, _) = setup().await;
        let token = CancellationToken::new();

        let alice = users.register_user("alice", &token).await.unwrap();
        let bob = users.register_user("bob", &token).await.unwrap();
        assert_eq!(alice.id, 1);
        assert_eq!(bob.id, 2);
        assert_eq!(users.get_user(2, &token).await.unwrap().name, "bob");

        assert_eq!(
            users.register_user("", &token).await.unwrap_err(),
            DirectoryError::InvalidUserName
        );
    }

    #[tokio::test]
    async fn test_attach_and_list() {
        let (users, sensors) = setup().await;
        let token = CancellationToken::new();

        let user = users.register_user("alice", &token).await.unwrap();
        let s1 = sensors
            .register(Sensor::new("0000000001", SensorType::Cc), &token)
            .await
            .unwrap();
        let s2 = sensors
            .register(Sensor::new("0000000002", SensorType::Adc), &token)
            .await
            .unwrap();

        users.attach_sensor(user.id, s2.id, &token).await.unwrap();
        users.attach_sensor(user.id, s1.id, &token).await.unwrap();
        users.attach_sensor(user.id, s1.id, &token).await.unwrap();

        let owned = users.user_sensors(user.id, &token).await.unwrap();
        assert_eq!(owned, vec![s1, s2]);
    }

    #[tokio::test]
    async fn test_attach_unknown_entities() {
        let (users, _) = setup().await;
        let token = CancellationToken::new();

        assert_eq!(
            users.attach_sensor(5, 1, &token).await.unwrap_err(),
            DirectoryError::UserNotFound(5)
        );

        let user = users.register_user("alice", &token).await.unwrap();
        assert_eq!(
            users.attach_sensor(user.id, 42, &token).await.unwrap_err(),
            DirectoryError::SensorNotFound(42)
        );
    }

    #[tokio::test]
    async fn test_user_without_sensors() {
        let (users, _) = setup().await;
        let token = CancellationToken::new();
        let user = users.register_user("carol", &token).await.unwrap();

        assert!(users.user_sensors(user.id, &token).await.unwrap().is_empty());
        assert!(users.user_sensors(99, &token).await.unwrap_err().is_not_found());
    }
}
