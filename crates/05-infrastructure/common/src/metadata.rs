//! 运行时类型元数据
//!
//! 组件的声明类型、注入点的请求类型都用 [`TypeRef`] 表示。泛型组件通过
//! [`TypeRef::Param`] 声明开放的类型参数，在请求到达时由 [`TypeRef::unify`]
//! 计算出参数绑定，再由 [`TypeRef::substitute`] 生成封闭类型。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 延迟句柄类型的名称（`Instance<T>`）
pub const INSTANCE_TYPE_NAME: &str = "Instance";

/// 注入点元数据类型的名称
pub const INJECTION_POINT_TYPE_NAME: &str = "InjectionPoint";

/// 类型引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    /// 具名类型，可带类型实参
    Named { name: Arc<str>, args: Arc<[TypeRef]> },
    /// 开放的泛型参数
    Param(Arc<str>),
}

impl TypeRef {
    /// 从 Rust 类型获取类型引用
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    /// 创建无类型实参的具名类型
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::Named {
            name: name.into(),
            args: Arc::from(Vec::new()),
        }
    }

    /// 创建泛型类型
    pub fn generic(name: impl Into<Arc<str>>, args: impl IntoIterator<Item = TypeRef>) -> Self {
        Self::Named {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// 创建泛型参数
    pub fn param(name: impl Into<Arc<str>>) -> Self {
        Self::Param(name.into())
    }

    /// 延迟句柄类型 `Instance<T>`
    pub fn instance_of(inner: TypeRef) -> Self {
        Self::generic(INSTANCE_TYPE_NAME, [inner])
    }

    /// 注入点元数据类型
    pub fn injection_point() -> Self {
        Self::named(INJECTION_POINT_TYPE_NAME)
    }

    /// 类型名称
    pub fn name(&self) -> &str {
        match self {
            Self::Named { name, .. } | Self::Param(name) => name,
        }
    }

    /// 简短名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        let name = self.name();
        let base = name.split('<').next().unwrap_or(name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// 类型实参
    pub fn args(&self) -> &[TypeRef] {
        match self {
            Self::Named { args, .. } => args,
            Self::Param(_) => &[],
        }
    }

    /// 是否不含任何开放的泛型参数
    pub fn is_concrete(&self) -> bool {
        match self {
            Self::Named { args, .. } => args.iter().all(Self::is_concrete),
            Self::Param(_) => false,
        }
    }

    /// 是否为延迟句柄类型
    pub fn is_instance(&self) -> bool {
        self.unwrap_instance().is_some()
    }

    /// 拆开延迟句柄，返回内部类型
    pub fn unwrap_instance(&self) -> Option<&TypeRef> {
        match self {
            Self::Named { name, args } if &**name == INSTANCE_TYPE_NAME && args.len() == 1 => {
                args.first()
            }
            _ => None,
        }
    }

    /// 是否为注入点元数据类型
    pub fn is_injection_point(&self) -> bool {
        matches!(self, Self::Named { name, args } if &**name == INJECTION_POINT_TYPE_NAME && args.is_empty())
    }

    /// 收集类型中出现的所有泛型参数
    pub fn params(&self) -> Vec<Arc<str>> {
        let mut params = Vec::new();
        self.collect_params(&mut params);
        params
    }

    fn collect_params(&self, params: &mut Vec<Arc<str>>) {
        match self {
            Self::Named { args, .. } => args.iter().for_each(|arg| arg.collect_params(params)),
            Self::Param(name) => {
                if !params.contains(name) {
                    params.push(name.clone());
                }
            }
        }
    }

    /// 以 `self` 为模式匹配 `concrete`，成功时返回泛型参数绑定
    pub fn unify(&self, concrete: &TypeRef) -> Option<TypeBindings> {
        let mut bindings = TypeBindings::new();
        self.unify_into(concrete, &mut bindings).then_some(bindings)
    }

    fn unify_into(&self, concrete: &TypeRef, bindings: &mut TypeBindings) -> bool {
        match (self, concrete) {
            (Self::Param(name), _) => bindings.bind(name.clone(), concrete.clone()),
            (
                Self::Named { name, args },
                Self::Named {
                    name: other_name,
                    args: other_args,
                },
            ) => {
                name == other_name
                    && args.len() == other_args.len()
                    && args
                        .iter()
                        .zip(other_args.iter())
                        .all(|(arg, other)| arg.unify_into(other, bindings))
            }
            (Self::Named { .. }, Self::Param(_)) => false,
        }
    }

    /// 用参数绑定替换泛型参数
    pub fn substitute(&self, bindings: &TypeBindings) -> TypeRef {
        match self {
            Self::Named { name, args } => Self::Named {
                name: name.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Self::Param(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, args } if args.is_empty() => write!(f, "{name}"),
            Self::Named { name, args } => {
                write!(f, "{name}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            Self::Param(name) => write!(f, "{name}"),
        }
    }
}

/// 泛型参数到具体类型的绑定
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeBindings {
    bindings: BTreeMap<Arc<str>, TypeRef>,
}

impl TypeBindings {
    /// 创建空绑定
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定参数，已有绑定不一致时返回 `false`
    pub fn bind(&mut self, param: Arc<str>, ty: TypeRef) -> bool {
        match self.bindings.get(&param) {
            Some(existing) => existing == &ty,
            None => {
                self.bindings.insert(param, ty);
                true
            }
        }
    }

    /// 获取参数绑定
    pub fn get(&self, param: &str) -> Option<&TypeRef> {
        self.bindings.get(param)
    }

    /// 是否绑定了类型中出现的全部参数
    pub fn covers(&self, ty: &TypeRef) -> bool {
        ty.params().iter().all(|param| self.bindings.contains_key(param))
    }

    /// 绑定数量
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// 遍历绑定
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &TypeRef)> {
        self.bindings.iter()
    }
}

impl fmt::Display for TypeBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (param, ty)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}={ty}")?;
        }
        Ok(())
    }
}
