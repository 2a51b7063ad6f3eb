//! Service container
//!
//! A small service locator used to assemble an engine and its collaborators
//! for one run. Services are registered on a [`ContainerBuilder`] as a
//! default-constructed type, a ready instance or a factory, and resolved by
//! type from the [`Container`] it builds. The container is an explicit scope:
//! singletons live exactly as long as the container that created them.

use crate::error::{ContainerError, ContainerResult};
use std::any::{type_name, Any, TypeId};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// How often a registration constructs its service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// A new instance for every resolution
    Transient,
    /// Constructed on first resolution, then shared
    Singleton,
}

type Factory = Box<dyn Fn(&Container) -> ContainerResult<Box<dyn Any>>>;

struct Registration {
    lifetime: Lifetime,
    factory: Factory,
    instance: OnceCell<Box<dyn Any>>,
}

#[derive(Default)]
pub struct ContainerBuilder {
    services: HashMap<TypeId, Vec<Registration>>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, constructed with `Default`
    pub fn register_type<T: Default + 'static>(self, lifetime: Lifetime) -> Self {
        self.register_factory::<T, _>(lifetime, |_| Ok(Rc::new(T::default())))
    }

    /// Register an existing instance. Every resolution returns it.
    pub fn register_instance<T: ?Sized + 'static>(mut self, instance: Rc<T>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(Box::new(instance.clone()) as Box<dyn Any>);
        self.push::<T>(Registration {
            lifetime: Lifetime::Singleton,
            factory: Box::new(move |_: &Container| Ok(Box::new(instance.clone()) as Box<dyn Any>)),
            instance: cell,
        });
        self
    }

    /// Register a factory. The factory may resolve other services from the
    /// container it is given.
    pub fn register_factory<T, F>(mut self, lifetime: Lifetime, factory: F) -> Self
    where
        T: ?Sized + 'static,
        F: Fn(&Container) -> ContainerResult<Rc<T>> + 'static,
    {
        self.push::<T>(Registration {
            lifetime,
            factory: Box::new(move |container: &Container| {
                Ok(Box::new(factory(container)?) as Box<dyn Any>)
            }),
            instance: OnceCell::new(),
        });
        self
    }

    fn push<T: ?Sized + 'static>(&mut self, registration: Registration) {
        debug!(service = type_name::<T>(), lifetime = ?registration.lifetime, "registering service");
        self.services
            .entry(TypeId::of::<T>())
            .or_default()
            .push(registration);
    }

    pub fn build(self) -> Container {
        Container {
            services: self.services,
        }
    }
}

/// A built set of services
pub struct Container {
    services: HashMap<TypeId, Vec<Registration>>,
}

impl Container {
    /// Resolve the most recent registration for `T`
    pub fn resolve<T: ?Sized + 'static>(&self) -> ContainerResult<Rc<T>> {
        let registration = self
            .services
            .get(&TypeId::of::<T>())
            .and_then(|registrations| registrations.last())
            .ok_or(ContainerError::NotRegistered(type_name::<T>()))?;
        self.produce(registration)
    }

    /// Resolve every registration for `T`, in registration order. Nothing
    /// registered resolves to an empty list.
    pub fn resolve_all<T: ?Sized + 'static>(&self) -> ContainerResult<Vec<Rc<T>>> {
        match self.services.get(&TypeId::of::<T>()) {
            Some(registrations) => registrations.iter().map(|r| self.produce(r)).collect(),
            None => Ok(Vec::new()),
        }
    }

    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    fn produce<T: ?Sized + 'static>(&self, registration: &Registration) -> ContainerResult<Rc<T>> {
        if registration.lifetime == Lifetime::Transient {
            let value = (registration.factory)(self)?;
            return downcast(&*value);
        }

        let value = match registration.instance.get() {
            Some(value) => value,
            None => {
                let value = (registration.factory)(self)?;
                registration.instance.get_or_init(|| value)
            }
        };
        downcast(&**value)
    }
}

fn downcast<T: ?Sized + 'static>(value: &dyn Any) -> ContainerResult<Rc<T>> {
    value
        .downcast_ref::<Rc<T>>()
        .cloned()
        .ok_or_else(|| ContainerError::Construction {
            service: type_name::<T>(),
            reason: "factory produced a value of another type".to_string(),
        })
}

impl Drop for Container {
    fn drop(&mut self) {
        debug!(services = self.services.len(), "disposing service container");
    }
}
